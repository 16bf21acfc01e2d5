use kinship_layout::layout_dump::LayoutDump;
use kinship_layout::{LayoutConfig, LayoutHooks, PersonId, RelationStore, compute_layout};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FamilyLayoutOptions {
    main_id: Option<String>,
    #[serde(flatten)]
    config: LayoutConfig,
}

fn layout_json(store_json: &str, options: FamilyLayoutOptions) -> Result<String, String> {
    let mut store = RelationStore::from_json(store_json).map_err(|error| error.to_string())?;
    let main = options.main_id.map(PersonId::from);
    let hooks = LayoutHooks::from_config(&options.config);
    let layout = compute_layout(&mut store, main.as_ref(), &options.config, &hooks);
    serde_json::to_string(&LayoutDump::from_layout(&layout)).map_err(|error| error.to_string())
}

#[wasm_bindgen(js_name = computeFamilyLayout)]
pub fn compute_family_layout(
    store_json: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<FamilyLayoutOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        FamilyLayoutOptions::default()
    };
    layout_json(store_json, options).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{FamilyLayoutOptions, layout_json};

    const FAMILY: &str = r#"[
        {"id": "M", "data": {"gender": "M"}, "rels": {"spouses": ["W"], "children": ["K"]}},
        {"id": "W", "data": {"gender": "F"}, "rels": {"spouses": ["M"], "children": ["K"]}},
        {"id": "K", "data": {"gender": "F"}, "rels": {"father": "M", "mother": "W"}}
    ]"#;

    #[test]
    fn lays_out_family_from_json() {
        let options: FamilyLayoutOptions =
            serde_json::from_str(r#"{"mainId": "K", "isHorizontal": true}"#).expect("options");
        assert_eq!(options.main_id.as_deref(), Some("K"));
        assert!(options.config.is_horizontal);

        let json = layout_json(FAMILY, options).expect("layout");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["main_id"], "K");
        assert_eq!(value["nodes"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn exposes_toggle_keys_and_collapsed_paths() {
        let cousins = r#"[
            {"id": "P", "data": {"gender": "M"},
             "rels": {"spouses": ["Q"], "children": ["A", "B"]}},
            {"id": "Q", "data": {"gender": "F"},
             "rels": {"spouses": ["P"], "children": ["A", "B"]}},
            {"id": "A", "data": {"gender": "M"},
             "rels": {"father": "P", "mother": "Q", "spouses": ["SA"], "children": ["C"]}},
            {"id": "SA", "data": {"gender": "F"}, "rels": {"spouses": ["A"], "children": ["C"]}},
            {"id": "B", "data": {"gender": "F"},
             "rels": {"father": "P", "mother": "Q", "spouses": ["SB"], "children": ["D"]}},
            {"id": "SB", "data": {"gender": "M"}, "rels": {"spouses": ["B"], "children": ["D"]}},
            {"id": "C", "data": {"gender": "M"},
             "rels": {"father": "A", "mother": "SA", "spouses": ["D"], "children": ["X"]}},
            {"id": "D", "data": {"gender": "F"},
             "rels": {"father": "SB", "mother": "B", "spouses": ["C"], "children": ["X"]}},
            {"id": "X", "data": {"gender": "M"}, "rels": {"father": "C", "mother": "D"}}
        ]"#;
        let options: FamilyLayoutOptions =
            serde_json::from_str(r#"{"mainId": "P", "duplicateBranchToggle": true}"#)
                .expect("options");
        let json = layout_json(cousins, options).expect("layout");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        let nodes = value["nodes"].as_array().expect("nodes");
        let toggles: Vec<&serde_json::Value> = nodes
            .iter()
            .filter_map(|n| n.get("toggle"))
            .collect();
        assert!(!toggles.is_empty());
        for toggle in toggles {
            assert!(toggle["owner_id"].is_string());
            assert!(toggle["branching_parent_id"].is_string());
            assert!(toggle["partner_id"].is_string());
        }

        let links = value["links"].as_array().expect("links");
        for link in links {
            let points = link["points"].as_array().map(Vec::len);
            assert_eq!(link["collapsed"].as_array().map(Vec::len), points);
        }
    }

    #[test]
    fn rejects_malformed_store() {
        assert!(layout_json("{not json", FamilyLayoutOptions::default()).is_err());
    }
}
