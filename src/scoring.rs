//! Pure classification functions over aggregated phase statistics.
//!
//! Everything in this module is deterministic and stateless: the same
//! inputs always produce the same labels, with no clock or RNG involved.
//! Thresholds live in per-entry policies so each one can be tested on its
//! own.

use serde::Serialize;

/// Qualitative band shared by the stability and overall ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Band::Poor => write!(f, "Poor"),
            Band::Fair => write!(f, "Fair"),
            Band::Good => write!(f, "Good"),
            Band::Excellent => write!(f, "Excellent"),
        }
    }
}

/// Connection stability: a 0-100 score with its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stability {
    pub score: u32,
    pub band: Band,
}

/// Weighted blend of latency, jitter, and packet loss.
///
/// Ping contributes 40%, jitter and packet loss 30% each. Each component
/// is clamped at zero before weighting so one terrible input cannot drag
/// the others negative.
pub fn stability_score(
    ping_ms: f64,
    jitter_ms: f64,
    packet_loss: f64,
) -> Stability {
    let ping_score = (100.0 - (ping_ms / 100.0) * 50.0).max(0.0);
    let jitter_score = (100.0 - jitter_ms * 10.0).max(0.0);
    let loss_score = 100.0 - packet_loss * 100.0;

    let score =
        (ping_score * 0.4 + jitter_score * 0.3 + loss_score * 0.3).round()
            as u32;

    let band = if score >= 80 {
        Band::Excellent
    } else if score >= 60 {
        Band::Good
    } else if score >= 40 {
        Band::Fair
    } else {
        Band::Poor
    };

    Stability { score, band }
}

/// Overall connection rating: additive point score with band and blurb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverallRating {
    pub band: Band,
    pub score: u32,
    pub description: &'static str,
}

pub fn overall_rating(
    download_mbps: f64,
    upload_mbps: f64,
    ping_ms: f64,
    jitter_ms: Option<f64>,
) -> OverallRating {
    let mut score: u32 = 0;

    // Download carries the most weight, 40 points.
    if download_mbps >= 100.0 {
        score += 40;
    } else if download_mbps >= 50.0 {
        score += 30;
    } else if download_mbps >= 25.0 {
        score += 20;
    } else if download_mbps >= 10.0 {
        score += 10;
    }

    // Upload, 30 points.
    if upload_mbps >= 20.0 {
        score += 30;
    } else if upload_mbps >= 10.0 {
        score += 22;
    } else if upload_mbps >= 5.0 {
        score += 15;
    } else if upload_mbps >= 1.0 {
        score += 8;
    }

    // Ping, 20 points.
    if ping_ms <= 20.0 {
        score += 20;
    } else if ping_ms <= 50.0 {
        score += 15;
    } else if ping_ms <= 100.0 {
        score += 10;
    } else if ping_ms <= 200.0 {
        score += 5;
    }

    // Jitter, 10 points. A missing measurement takes the midpoint rather
    // than the floor.
    match jitter_ms {
        Some(jitter) => {
            if jitter <= 5.0 {
                score += 10;
            } else if jitter <= 15.0 {
                score += 7;
            } else if jitter <= 30.0 {
                score += 4;
            } else if jitter <= 50.0 {
                score += 2;
            }
        }
        None => score += 5,
    }

    let (band, description) = if score >= 85 {
        (
            Band::Excellent,
            "Perfect for 4K streaming, gaming, and large file transfers",
        )
    } else if score >= 65 {
        (
            Band::Good,
            "Great for HD streaming, video calls, and general browsing",
        )
    } else if score >= 40 {
        (Band::Fair, "Suitable for basic streaming and web browsing")
    } else {
        (
            Band::Poor,
            "May experience issues with streaming and large downloads",
        )
    };

    OverallRating { band, score, description }
}

/// Likelihood of playback stalls at a given quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BufferingRisk {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for BufferingRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferingRisk::Low => write!(f, "Low"),
            BufferingRisk::Medium => write!(f, "Medium"),
            BufferingRisk::High => write!(f, "High"),
        }
    }
}

/// Streaming verdict for one tier given its required bitrate.
///
/// Playable means the average holds the bitrate and the worst chunk stayed
/// above 80% of it. Risk is driven by the floor first: dips below the
/// bitrate mean High regardless of the average.
pub fn assess_streaming(
    required_bitrate_mbps: f64,
    avg_mbps: f64,
    min_mbps: f64,
) -> (bool, BufferingRisk) {
    let can_stream = avg_mbps >= required_bitrate_mbps
        && min_mbps >= required_bitrate_mbps * 0.8;

    let risk = if min_mbps < required_bitrate_mbps {
        BufferingRisk::High
    } else if avg_mbps < required_bitrate_mbps * 1.5 {
        BufferingRisk::Medium
    } else {
        BufferingRisk::Low
    };

    (can_stream, risk)
}

/// Threshold policy for one service or title.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "threshold")]
pub enum Requirement {
    /// No meaningful floor; any working connection qualifies.
    Always,
    /// Needs download speed strictly above this many Mbps.
    MinDownloadMbps(f64),
    /// Needs ping strictly below this many milliseconds.
    MaxPingMs(f64),
}

impl Requirement {
    pub fn met(self, download_mbps: f64, ping_ms: f64) -> bool {
        match self {
            Requirement::Always => true,
            Requirement::MinDownloadMbps(floor) => download_mbps > floor,
            Requirement::MaxPingMs(ceiling) => ping_ms < ceiling,
        }
    }
}

/// One service/title with its policy outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Compatibility {
    pub name: &'static str,
    pub requirement: Requirement,
    pub compatible: bool,
}

/// Streaming platforms and their per-entry gates.
pub const PLATFORMS: [(&str, Requirement); 6] = [
    ("YouTube", Requirement::Always),
    ("Vidio", Requirement::Always),
    ("Netflix", Requirement::MinDownloadMbps(5.0)),
    ("Disney+ Hotstar", Requirement::MinDownloadMbps(5.0)),
    ("iFlix", Requirement::MinDownloadMbps(3.0)),
    ("Viu", Requirement::MinDownloadMbps(3.0)),
];

/// Online games and their per-entry gates.
pub const GAMES: [(&str, Requirement); 6] = [
    ("Mobile Legends", Requirement::MaxPingMs(100.0)),
    ("PUBG Mobile", Requirement::MinDownloadMbps(5.0)),
    ("Valorant", Requirement::MaxPingMs(80.0)),
    ("Genshin Impact", Requirement::MinDownloadMbps(10.0)),
    ("Free Fire", Requirement::MaxPingMs(120.0)),
    ("DOTA 2", Requirement::MaxPingMs(60.0)),
];

fn evaluate(
    table: &[(&'static str, Requirement)],
    download_mbps: f64,
    ping_ms: f64,
) -> Vec<Compatibility> {
    table
        .iter()
        .map(|&(name, requirement)| Compatibility {
            name,
            requirement,
            compatible: requirement.met(download_mbps, ping_ms),
        })
        .collect()
}

pub fn platform_compatibility(
    download_mbps: f64,
    ping_ms: f64,
) -> Vec<Compatibility> {
    evaluate(&PLATFORMS, download_mbps, ping_ms)
}

pub fn game_compatibility(
    download_mbps: f64,
    ping_ms: f64,
) -> Vec<Compatibility> {
    evaluate(&GAMES, download_mbps, ping_ms)
}
