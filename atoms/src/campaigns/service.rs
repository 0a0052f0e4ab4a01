use super::model::Campaign;

pub fn find_by_id(campaigns: &[Campaign], id: i64) -> Option<&Campaign> {
    campaigns.iter().find(|c| c.id == id)
}

/// Campaign names are unique in the directory.
pub fn find_by_name<'a>(campaigns: &'a [Campaign], name: &str) -> Option<&'a Campaign> {
    campaigns.iter().find(|c| c.name == name)
}

/// Parse a directory payload (a JSON array of campaign records), dropping
/// records that fail to parse.
pub fn parse_directory(body: &serde_json::Value) -> Vec<Campaign> {
    match body.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_by_id_and_name() {
        let campaigns = vec![
            Campaign {
                id: 1,
                name: "Spring Launch".to_string(),
                slack_id: Some("C012345".to_string()),
            },
            Campaign {
                id: 2,
                name: "Black Friday".to_string(),
                slack_id: None,
            },
        ];
        assert_eq!(find_by_id(&campaigns, 2).unwrap().name, "Black Friday");
        assert_eq!(find_by_name(&campaigns, "Spring Launch").unwrap().id, 1);
        assert!(find_by_id(&campaigns, 9).is_none());
    }

    #[test]
    fn directory_parse_reads_slack_id() {
        let body = json!([{"id": 4, "name": "Q3 Promo", "slackId": "C0AAA"}]);
        let campaigns = parse_directory(&body);
        assert_eq!(campaigns[0].slack_id.as_deref(), Some("C0AAA"));
    }
}
