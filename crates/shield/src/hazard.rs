//! Read-only hazard data the tools answer questions from.
//!
//! The dashboard owns the real datasets; the agent only queries them through [`HazardData`].
//! [`StaticHazardData`] carries the demo scenario: Cyclone Ditwah in the North Indian basin
//! and the same storm replayed off Florida for the North Atlantic.
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycloneTrackPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: String,
    pub wind_speed_kmph: f64,
    pub pressure_hpa: f64,
    pub category: String,
    pub is_forecast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRisk {
    pub id: String,
    pub name: String,
    pub state: String,
    /// 0-10
    pub risk_score: f64,
    pub risk_ci_lower: f64,
    pub risk_ci_upper: f64,
    pub population_affected: u64,
    pub critical_infrastructure_count: u32,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ShelterKind {
    School,
    CommunityHall,
    Bunker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
    pub id: String,
    pub name: String,
    pub capacity: u32,
    pub occupied: u32,
    pub lat: f64,
    pub lng: f64,
    pub kind: ShelterKind,
}

/// Everything the tools may read about one region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionData {
    pub track: Vec<CycloneTrackPoint>,
    pub districts: Vec<DistrictRisk>,
    pub shelters: Vec<Shelter>,
}

/// An ocean basin the map can be switched to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Basin {
    pub id: &'static str,
    pub name: &'static str,
    pub agency: &'static str,
    pub countries: &'static [&'static str],
    /// What the agent should concentrate on while this basin is active
    pub focus: &'static str,
}

lazy_static! {
    static ref BASINS: Vec<Basin> = vec![
        Basin {
            id: "ni",
            name: "North Indian",
            agency: "IMD+ECMWF",
            countries: &["India", "Bangladesh", "Sri Lanka", "Myanmar"],
            focus: "India/Chennai focus",
        },
        Basin {
            id: "na",
            name: "North Atlantic",
            agency: "NHC+NOAA",
            countries: &["USA", "Mexico", "Cuba", "Bahamas"],
            focus: "USA/Florida focus",
        },
        Basin {
            id: "ep",
            name: "Eastern Pacific",
            agency: "NHC",
            countries: &["Mexico", "Guatemala"],
            focus: "Mexico focus",
        },
        Basin {
            id: "wp",
            name: "Western Pacific",
            agency: "JMA+GFS",
            countries: &["Japan", "Philippines", "China"],
            focus: "Japan/Philippines focus",
        },
        Basin {
            id: "si",
            name: "SW Indian",
            agency: "MeteoFrance",
            countries: &["Madagascar", "Mozambique"],
            focus: "Madagascar focus",
        },
        Basin {
            id: "au",
            name: "Australian",
            agency: "BoM",
            countries: &["Australia", "Indonesia"],
            focus: "Queensland focus",
        },
        Basin {
            id: "sp",
            name: "South Pacific",
            agency: "FMS",
            countries: &["Fiji", "Vanuatu"],
            focus: "Fiji focus",
        },
    ];
}

/// The global basin catalogue
pub fn basins() -> &'static [Basin] {
    &BASINS
}

pub fn find_basin(id: &str) -> Option<&'static Basin> {
    BASINS.iter().find(|basin| basin.id.eq_ignore_ascii_case(id))
}

/// Read-only access to the dashboard's hazard datasets
pub trait HazardData: Send + Sync {
    /// Tracks, districts and shelters for a region, or None when the region is unknown
    fn region_data(&self, region_id: &str) -> Option<RegionData>;
}

/// The bundled demo scenario
#[derive(Debug, Clone)]
pub struct StaticHazardData {
    north_indian: RegionData,
    north_atlantic: RegionData,
}

impl Default for StaticHazardData {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticHazardData {
    pub fn new() -> Self {
        let north_indian = RegionData {
            track: ditwah_track(),
            districts: tamil_nadu_districts(),
            shelters: chennai_shelters(),
        };
        let north_atlantic = florida_replay(&north_indian);
        Self {
            north_indian,
            north_atlantic,
        }
    }
}

impl HazardData for StaticHazardData {
    fn region_data(&self, region_id: &str) -> Option<RegionData> {
        match region_id {
            "ni" => Some(self.north_indian.clone()),
            "na" => Some(self.north_atlantic.clone()),
            other => find_basin(other).map(|_| RegionData::default()),
        }
    }
}

// Chennai (13, 80) lands on Miami (26, -80)
const REPLAY_LAT_SHIFT: f64 = 13.0;
const REPLAY_LNG_SHIFT: f64 = -160.0;

fn florida_replay(source: &RegionData) -> RegionData {
    let track = source
        .track
        .iter()
        .map(|p| CycloneTrackPoint {
            lat: p.lat + REPLAY_LAT_SHIFT,
            lng: p.lng + REPLAY_LNG_SHIFT,
            ..p.clone()
        })
        .collect();
    let shelters = source
        .shelters
        .iter()
        .map(|s| Shelter {
            name: s
                .name
                .replace("Chennai", "Miami")
                .replace("Mahabalipuram", "Fort Lauderdale"),
            lat: s.lat + REPLAY_LAT_SHIFT,
            lng: s.lng + REPLAY_LNG_SHIFT,
            ..s.clone()
        })
        .collect();

    RegionData {
        track,
        districts: vec![
            district("fl1", "Miami-Dade", "Florida", 8.9, (8.5, 9.3), 2_700_000, 150, (25.7617, -80.1918)),
            district("fl2", "Broward", "Florida", 8.5, (8.0, 9.0), 1_900_000, 90, (26.1224, -80.1373)),
            district("fl3", "Palm Beach", "Florida", 7.8, (7.2, 8.4), 1_400_000, 60, (26.7153, -80.0534)),
            district("fl4", "Tampa Bay", "Florida", 6.5, (6.0, 7.0), 3_000_000, 80, (27.9506, -82.4572)),
        ],
        shelters,
    }
}

#[allow(clippy::too_many_arguments)]
fn district(
    id: &str,
    name: &str,
    state: &str,
    risk_score: f64,
    (risk_ci_lower, risk_ci_upper): (f64, f64),
    population_affected: u64,
    critical_infrastructure_count: u32,
    (lat, lng): (f64, f64),
) -> DistrictRisk {
    DistrictRisk {
        id: id.to_string(),
        name: name.to_string(),
        state: state.to_string(),
        risk_score,
        risk_ci_lower,
        risk_ci_upper,
        population_affected,
        critical_infrastructure_count,
        lat,
        lng,
    }
}

fn tamil_nadu_districts() -> Vec<DistrictRisk> {
    vec![
        district("tn1", "Chennai", "Tamil Nadu", 8.9, (8.5, 9.3), 8_500_000, 120, (13.0827, 80.2707)),
        district("tn2", "Chengalpattu", "Tamil Nadu", 8.5, (8.0, 9.0), 2_800_000, 45, (12.693, 80.003)),
        district("tn3", "Nagapattinam", "Tamil Nadu", 7.2, (6.8, 7.6), 1_600_000, 20, (10.76, 79.84)),
        district("tn4", "Ramanathapuram", "Tamil Nadu", 6.5, (6.0, 7.0), 1_300_000, 15, (9.36, 78.83)),
        district("tn5", "Cuddalore", "Tamil Nadu", 7.8, (7.2, 8.4), 2_600_000, 25, (11.748, 79.771)),
    ]
}

fn chennai_shelters() -> Vec<Shelter> {
    let shelter = |id: &str, name: &str, capacity, occupied, lat, lng, kind| Shelter {
        id: id.to_string(),
        name: name.to_string(),
        capacity,
        occupied,
        lat,
        lng,
        kind,
    };
    vec![
        shelter("s1", "Chennai Corp. Community Hall", 5000, 3200, 13.05, 80.22, ShelterKind::CommunityHall),
        shelter("s2", "Mahabalipuram Govt School", 2000, 1850, 12.62, 80.17, ShelterKind::School),
        shelter("s3", "Kalpakkam Safety Bunker", 3000, 450, 12.55, 80.16, ShelterKind::Bunker),
    ]
}

fn ditwah_track() -> Vec<CycloneTrackPoint> {
    let points: [(f64, f64, &str, f64, f64, &str, bool); 15] = [
        (5.8, 84.5, "2025-11-26T00:00:00Z", 45.0, 1004.0, "Depression", false),
        (6.2, 83.8, "2025-11-26T12:00:00Z", 50.0, 1002.0, "Deep Depression", false),
        (6.8, 82.5, "2025-11-27T00:00:00Z", 65.0, 998.0, "Cyclonic Storm", false),
        (7.2, 81.9, "2025-11-27T12:00:00Z", 75.0, 996.0, "Cyclonic Storm", false),
        (7.8, 81.2, "2025-11-28T00:00:00Z", 70.0, 998.0, "Cyclonic Storm", false),
        (8.5, 80.5, "2025-11-28T12:00:00Z", 60.0, 1000.0, "Deep Depression", false),
        (9.8, 80.6, "2025-11-29T00:00:00Z", 55.0, 1000.0, "Deep Depression", false),
        (10.9, 80.5, "2025-11-29T12:00:00Z", 60.0, 998.0, "Deep Depression", true),
        (11.5, 80.3, "2025-11-30T00:00:00Z", 55.0, 1000.0, "Deep Depression", true),
        (11.8, 80.2, "2025-11-30T12:00:00Z", 50.0, 1002.0, "Deep Depression", true),
        (12.2, 80.3, "2025-12-01T00:00:00Z", 45.0, 1004.0, "Deep Depression", true),
        (12.5, 80.2, "2025-12-01T12:00:00Z", 40.0, 1004.0, "Depression", true),
        (12.7, 79.9, "2025-12-02T00:00:00Z", 35.0, 1006.0, "Depression", true),
        (12.5, 79.5, "2025-12-02T12:00:00Z", 30.0, 1008.0, "Low Pressure Area", true),
        (12.1, 79.2, "2025-12-03T00:00:00Z", 20.0, 1010.0, "Dissipated", true),
    ];
    points
        .iter()
        .map(
            |&(lat, lng, timestamp, wind_speed_kmph, pressure_hpa, category, is_forecast)| {
                CycloneTrackPoint {
                    lat,
                    lng,
                    timestamp: timestamp.to_string(),
                    wind_speed_kmph,
                    pressure_hpa,
                    category: category.to_string(),
                    is_forecast,
                }
            },
        )
        .collect()
}
