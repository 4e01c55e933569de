//! FX session attribution for gap-start instants.
//!
//! UTC hour bands; overlaps are their own buckets so the session table sums
//! to the gap count.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    AsiaLondonOverlap,
    LondonNewYorkOverlap,
    NewYork,
    London,
    Asia,
    Other,
}

impl Session {
    pub fn label(&self) -> &'static str {
        match self {
            Session::AsiaLondonOverlap => "Asia-London overlap",
            Session::LondonNewYorkOverlap => "London-NY overlap",
            Session::NewYork => "NY",
            Session::London => "London",
            Session::Asia => "Asia",
            Session::Other => "Other",
        }
    }

    /// Attribute a UTC instant to a session band.
    pub fn of(ts: DateTime<Utc>) -> Session {
        let h = ts.hour() as f64 + ts.minute() as f64 / 60.0;
        let asia = h < 8.0;
        let london = (7.0..16.0).contains(&h);
        let ny = (12.0..21.0).contains(&h);
        if asia && london {
            Session::AsiaLondonOverlap
        } else if london && ny {
            Session::LondonNewYorkOverlap
        } else if ny {
            Session::NewYork
        } else if london {
            Session::London
        } else if asia {
            Session::Asia
        } else {
            Session::Other
        }
    }
}
