use crate::normalization::record::TradeRecord;

/// Records whose SKU contains `query` or whose name contains it (case-insensitive).
pub fn search_records<'a>(records: &'a [TradeRecord], query: &str) -> Vec<&'a TradeRecord> {
    let needle = query.trim().to_lowercase();
    records
        .iter()
        .filter(|r| r.sku.to_string().contains(&needle) || r.name.to_lowercase().contains(&needle))
        .collect()
}

/// Optional exact platform plus inclusive price bounds.
pub fn filter_records<'a>(
    records: &'a [TradeRecord],
    platform: Option<&str>,
    min_price: Option<f64>,
    max_price: Option<f64>,
) -> Vec<&'a TradeRecord> {
    records
        .iter()
        .filter(|r| platform.map_or(true, |p| r.platform == p))
        .filter(|r| min_price.map_or(true, |min| r.price >= min))
        .filter(|r| max_price.map_or(true, |max| r.price <= max))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<TradeRecord> {
        vec![
            TradeRecord::new(729016, "Pokemon Scarlet", "Nintendo Switch", 35.0),
            TradeRecord::new(100200, "Spider-Man 2", "Playstation 5", 40.0),
            TradeRecord::new(100201, "Pokemon Legends Arceus", "Nintendo Switch", 75.0),
            TradeRecord::new(555555, "Halo Infinite", "Xbox One", 10.0),
        ]
    }

    #[test]
    fn search_matches_sku_or_name() {
        let rs = records();
        let hits: Vec<u64> = search_records(&rs, "pokemon").iter().map(|r| r.sku).collect();
        assert_eq!(hits, vec![729016, 100201]);
        let hits: Vec<u64> = search_records(&rs, "1002").iter().map(|r| r.sku).collect();
        assert_eq!(hits, vec![100200, 100201]);
        assert!(search_records(&rs, "zelda").is_empty());
    }

    #[test]
    fn filter_combines_platform_and_price() {
        let rs = records();
        let hits: Vec<u64> = filter_records(&rs, Some("Nintendo Switch"), Some(30.0), Some(70.0))
            .iter()
            .map(|r| r.sku)
            .collect();
        assert_eq!(hits, vec![729016]);
        assert_eq!(filter_records(&rs, None, None, None).len(), 4);
        assert_eq!(filter_records(&rs, None, Some(40.0), None).len(), 2);
    }
}
