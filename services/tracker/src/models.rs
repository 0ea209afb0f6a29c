use crate::metrics::MetricsSnapshot;
use crate::parse::ParsePolicy;
use persistence::RecoveryReport;
use serde::Serialize;
use types::location::Entry;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrieveQuery {
    pub count: Option<String>,
}

impl RetrieveQuery {
    /// First `count` value wins, like every other repeated query key.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let count = pairs
            .into_iter()
            .find_map(|(key, value)| (key == "count").then_some(value));
        Self { count }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub server: String,
    pub parse_policy: ParsePolicy,
    pub max_count: u16,
    pub latest: Entry,
    pub metrics: MetricsSnapshot,
    pub recovery: Option<RecoveryReport>,
}
