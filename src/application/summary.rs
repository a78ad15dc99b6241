//! Point-in-time report of a queue's progress

use serde::Serialize;
use serde_json::json;

use super::queue_store::QueueStore;
use crate::domain::{Document, QueueResult, Statistic};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticSummary {
    pub name: &'static str,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub queue_name: String,
    pub length: u64,
    pub queued: u64,
    pub fetched: u64,
    pub oldest_unfetched_url: Option<String>,
    pub statistics: Vec<StatisticSummary>,
}

impl QueueSummary {
    pub async fn collect(store: &QueueStore) -> QueueResult<Self> {
        let length = store.get_length().await?;
        let queued = store.count_items(&filter(json!({"status": "queued"}))).await?;
        let fetched = store.count_items(&filter(json!({"fetched": true}))).await?;
        let oldest_unfetched_url = store.oldest_unfetched_item().await?.map(|item| item.url);

        let mut statistics = Vec::with_capacity(Statistic::ALL.len());
        for statistic in Statistic::ALL {
            let name = statistic.as_str();
            statistics.push(StatisticSummary {
                name,
                max: store.max(name).await?,
                min: store.min(name).await?,
                avg: store.avg(name).await?,
            });
        }

        Ok(Self {
            queue_name: store.name().to_string(),
            length,
            queued,
            fetched,
            oldest_unfetched_url,
            statistics,
        })
    }

    pub fn statistic(&self, statistic: Statistic) -> Option<&StatisticSummary> {
        self.statistics.iter().find(|summary| summary.name == statistic.as_str())
    }
}

impl QueueStore {
    /// Progress report for this queue.
    pub async fn summary(&self) -> QueueResult<QueueSummary> {
        QueueSummary::collect(self).await
    }
}

fn filter(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(document) => document,
        _ => Document::new(),
    }
}
