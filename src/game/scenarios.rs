// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Board layout tables: which neighbourhood decks each scenario uses

use serde::Serialize;

use super::settings::Scenario;

/// Encounter deck locations, including the anomaly and mystery decks that are
/// drawn from like neighbourhoods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Neighbourhood {
    #[serde(rename = "Downtown")]
    Downtown,
    #[serde(rename = "Easttown")]
    Easttown,
    #[serde(rename = "Merchant District")]
    MerchantDistrict,
    #[serde(rename = "Miskatonic University")]
    MiskatonicUniversity,
    #[serde(rename = "Northside")]
    Northside,
    #[serde(rename = "Rivertown")]
    Rivertown,
    #[serde(rename = "Southside")]
    Southside,
    #[serde(rename = "Uptown")]
    Uptown,
    #[serde(rename = "The Streets")]
    TheStreets,
    #[serde(rename = "Central Kingsport")]
    CentralKingsport,
    #[serde(rename = "Innsmouth Shore")]
    InnsmouthShore,
    #[serde(rename = "Innsmouth Village")]
    InnsmouthVillage,
    #[serde(rename = "Kingsport Harbor")]
    KingsportHarbor,
    #[serde(rename = "Travel Routes")]
    TravelRoutes,
    #[serde(rename = "Devil Reef")]
    DevilReef,
    #[serde(rename = "Strange High House")]
    StrangeHighHouse,
    #[serde(rename = "French Hill")]
    FrenchHill,
    #[serde(rename = "The Underworld")]
    TheUnderworld,
    #[serde(rename = "Thresholds")]
    Thresholds,
    #[serde(rename = "The Unnamable")]
    TheUnnamable,
    #[serde(rename = "Witch House")]
    WitchHouse,
    #[serde(rename = "Fractured Reality")]
    FracturedReality,
    #[serde(rename = "Lost Souls")]
    LostSouls,
    #[serde(rename = "Nightmare Breach")]
    NightmareBreach,
    #[serde(rename = "Temporal Fissure")]
    TemporalFissure,
    #[serde(rename = "Visions of the Moon")]
    VisionsOfTheMoon,
    #[serde(rename = "Yuggoth Emergent")]
    YuggothEmergent,
}

/// Terror decks used by the Under Dark Waves scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Terror {
    #[serde(rename = "Feeding Frenzy")]
    FeedingFrenzy,
    #[serde(rename = "Frozen City")]
    FrozenCity,
}

use Neighbourhood::*;

/// Decks on the table when the scenario starts
pub fn starting_neighbourhoods(scenario: Scenario) -> &'static [Neighbourhood] {
    match scenario {
        Scenario::ApproachOfAzathoth => &[
            Northside, Downtown, Easttown, MerchantDistrict, Rivertown, TheStreets, TemporalFissure,
        ],
        Scenario::FeastForUmordhoth => &[Downtown, Easttown, Rivertown, Uptown, Southside, TheStreets],
        Scenario::VeilOfTwilight => &[
            Northside, Rivertown, Southside, MiskatonicUniversity, Uptown, TheStreets, FracturedReality,
        ],
        Scenario::EchoesOfTheDeep => &[
            MiskatonicUniversity, MerchantDistrict, Northside, Rivertown, Downtown, TheStreets, NightmareBreach,
        ],
        Scenario::ShotsInTheDark => &[Downtown, Easttown, Rivertown, Northside, MerchantDistrict, TheStreets],
        Scenario::SilenceOfTsathoggua => &[
            Northside, MerchantDistrict, Rivertown, MiskatonicUniversity, Uptown, TheStreets, YuggothEmergent,
        ],
        Scenario::DreamsOfRlyeh => &[MiskatonicUniversity, Rivertown, Uptown, Southside, TheStreets, TravelRoutes],
        Scenario::ThePaleLantern => &[
            Downtown, MiskatonicUniversity, Uptown, CentralKingsport, KingsportHarbor, TheStreets, TravelRoutes,
            StrangeHighHouse, VisionsOfTheMoon,
        ],
        Scenario::TyrantsOfRuin => &[
            Northside, Easttown, MiskatonicUniversity, Southside, InnsmouthShore, InnsmouthVillage, TheStreets,
            TravelRoutes, DevilReef,
        ],
        Scenario::IthaquasChildren => &[
            Downtown, Northside, Rivertown, Easttown, Southside, InnsmouthShore, CentralKingsport, TheStreets,
            TravelRoutes,
        ],
        Scenario::TheDeadCryOut => &[
            Northside, Easttown, MiskatonicUniversity, TheUnderworld, FrenchHill, Uptown, Southside, TheStreets,
            Thresholds,
        ],
        Scenario::TheKeyAndTheGate => &[
            Easttown, FrenchHill, Uptown, Rivertown, MerchantDistrict, TheStreets, TheUnnamable, FracturedReality,
        ],
        Scenario::BoundToServe => &[
            Downtown, MerchantDistrict, Rivertown, FrenchHill, Uptown, Southside, TheStreets, WitchHouse, LostSouls,
        ],
    }
}

/// Decks the scenario adds part way through
pub fn later_neighbourhoods(scenario: Scenario) -> &'static [Neighbourhood] {
    match scenario {
        Scenario::DreamsOfRlyeh => &[CentralKingsport, KingsportHarbor, InnsmouthShore, InnsmouthVillage],
        Scenario::TheKeyAndTheGate => &[Thresholds, TheUnderworld],
        _ => &[],
    }
}

/// The terror deck and the neighbourhood it starts under
pub fn terror(scenario: Scenario) -> Option<(Terror, Neighbourhood)> {
    match scenario {
        Scenario::TyrantsOfRuin => Some((Terror::FeedingFrenzy, InnsmouthShore)),
        Scenario::IthaquasChildren => Some((Terror::FrozenCity, Easttown)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_scenario_has_the_streets() {
        for scenario in Scenario::ALL {
            assert!(starting_neighbourhoods(scenario).contains(&TheStreets), "{}", scenario);
        }
    }

    #[test]
    fn test_later_decks_are_not_on_the_table_yet() {
        for scenario in Scenario::ALL {
            let start: HashSet<_> = starting_neighbourhoods(scenario).iter().collect();
            assert!(later_neighbourhoods(scenario).iter().all(|n| !start.contains(n)));
        }
        assert_eq!(later_neighbourhoods(Scenario::TheKeyAndTheGate), &[Thresholds, TheUnderworld]);
    }

    #[test]
    fn test_terror_starts_on_the_board() {
        let (deck, home) = terror(Scenario::TyrantsOfRuin).unwrap();
        assert_eq!(deck, Terror::FeedingFrenzy);
        assert!(starting_neighbourhoods(Scenario::TyrantsOfRuin).contains(&home));
        assert!(terror(Scenario::FeastForUmordhoth).is_none());
    }

    #[test]
    fn test_neighbourhood_serialises_as_printed_name() {
        assert_eq!(serde_json::to_string(&MiskatonicUniversity).unwrap(), "\"Miskatonic University\"");
        assert_eq!(serde_json::to_string(&Terror::FrozenCity).unwrap(), "\"Frozen City\"");
    }
}
