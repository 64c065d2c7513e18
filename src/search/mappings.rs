use serde_json::{json, Value};

/// `keeper-prices` index settings/mappings (§4.6). `max_result_window` is
/// raised from the Elastic default of 10 000 to accommodate the full
/// history window this index is expected to serve.
pub fn prices_index_body(max_result_window: u32) -> Value {
    json!({
        "settings": {
            "index": { "max_result_window": max_result_window }
        },
        "mappings": {
            "properties": {
                "product_code": { "type": "keyword" },
                "product_title": {
                    "type": "text",
                    "fields": { "exact": { "type": "keyword" } }
                },
                "current_price": { "type": "double" },
                "target_price": { "type": "double" },
                "previous_price": { "type": "double" },
                "percent_change": { "type": "double" },
                "domain": { "type": "keyword" },
                "currency": { "type": "keyword" },
                "timestamp": { "type": "date" },
                "event_type": { "type": "keyword" }
            }
        }
    })
}

/// `keeper-deals` index settings/mappings (§4.6). `deal_text_analyzer`
/// composes a standard tokenizer with lowercase, a language-aware stemmer,
/// and diacritic (ASCII) folding, so EU-marketplace titles in German,
/// French, Italian and Spanish all normalize to comparable tokens.
pub fn deals_index_body(max_result_window: u32) -> Value {
    json!({
        "settings": {
            "index": { "max_result_window": max_result_window },
            "analysis": {
                "filter": {
                    "deal_stemmer": {
                        "type": "stemmer",
                        "language": "light_german"
                    },
                    "deal_ascii_fold": {
                        "type": "asciifolding",
                        "preserve_original": true
                    }
                },
                "analyzer": {
                    "deal_text_analyzer": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "deal_ascii_fold", "deal_stemmer"]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "product_code": { "type": "keyword" },
                "title": {
                    "type": "text",
                    "analyzer": "deal_text_analyzer",
                    "fields": {
                        "suggest": { "type": "completion" }
                    }
                },
                "description": {
                    "type": "text",
                    "analyzer": "deal_text_analyzer"
                },
                "current_price": { "type": "double" },
                "original_price": { "type": "double" },
                "discount_percent": { "type": "double" },
                "rating": { "type": "double" },
                "review_count": { "type": "integer" },
                "sales_rank": { "type": "integer" },
                "domain": { "type": "keyword" },
                "category": { "type": "keyword" },
                "prime_eligible": { "type": "boolean" },
                "url": { "type": "keyword" },
                "deal_score": { "type": "double" },
                "timestamp": { "type": "date" }
            }
        }
    })
}
