//! Timeline events recorded while the page loaded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationData {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InstrumentationData>,
}

impl InstrumentationData {
    pub fn new(event_type: &str, start_time: f64, end_time: f64) -> Self {
        Self {
            event_type: event_type.to_string(),
            start_time,
            end_time,
            ..Default::default()
        }
    }

    /// Depth-first, parents before children.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a InstrumentationData)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// Number of events of `event_type` anywhere in `events`.
pub fn count_events(events: &[InstrumentationData], event_type: &str) -> usize {
    let mut count = 0;
    for event in events {
        event.walk(&mut |e| {
            if e.event_type == event_type {
                count += 1;
            }
        });
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_and_count() {
        let mut parse = InstrumentationData::new("ParseHTML", 0.0, 10.0);
        parse.children.push(InstrumentationData::new("EvaluateScript", 2.0, 6.0));
        parse.children.push(InstrumentationData::new("Layout", 7.0, 5.0));
        let events = vec![parse, InstrumentationData::new("Layout", 11.0, 12.0)];

        assert_eq!(count_events(&events, "Layout"), 2);
        assert_eq!(count_events(&events, "Paint"), 0);
        assert_eq!(events[0].children[1].duration(), 0.0);

        let mut order = Vec::new();
        events[0].walk(&mut |e| order.push(e.event_type.as_str()));
        assert_eq!(order, vec!["ParseHTML", "EvaluateScript", "Layout"]);
    }

    #[test]
    fn test_deserialize() {
        let json = r#"[{"type":"ResourceSendRequest","startTime":1.5,"data":{"url":"http://a.com/"}}]"#;
        let events: Vec<InstrumentationData> = serde_json::from_str(json).unwrap();
        assert_eq!(events[0].event_type, "ResourceSendRequest");
        assert_eq!(events[0].data["url"], "http://a.com/");
    }
}
