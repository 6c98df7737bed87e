use proptest::prelude::*;
use rustgrab::format::FormatSelector;
use rustgrab::Format;

fn catalogue(ids: &[u16]) -> Vec<Format> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| Format {
            format_id: format!("f{}", id),
            url: format!("http://media.example/{}", id),
            ext: if i % 2 == 0 { "mp4" } else { "webm" }.into(),
            preference: Some(i as i64),
            ..Default::default()
        })
        .collect()
}

fn unique_ids() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::btree_set(0u16..500, 1..12).prop_map(|set| set.into_iter().collect())
}

fn pick(spec: &str, formats: &[Format]) -> Vec<String> {
    FormatSelector::compile(spec)
        .unwrap()
        .evaluate(formats, None)
        .unwrap()
        .into_iter()
        .map(|s| s.format.format_id)
        .collect()
}

proptest! {
    #[test]
    fn best_is_last_and_worst_is_first(ids in unique_ids()) {
        let formats = catalogue(&ids);
        prop_assert_eq!(pick("best", &formats), vec![formats.last().unwrap().format_id.clone()]);
        prop_assert_eq!(pick("worst", &formats), vec![formats[0].format_id.clone()]);
    }

    #[test]
    fn pick_first_takes_left_when_present(ids in unique_ids(), left in 0usize..12, right in 0usize..12) {
        let formats = catalogue(&ids);
        let left_id = &formats[left % formats.len()].format_id;
        let right_id = &formats[right % formats.len()].format_id;
        let spec = format!("{}/{}", left_id, right_id);
        prop_assert_eq!(pick(&spec, &formats), vec![left_id.clone()]);
    }

    #[test]
    fn pick_first_falls_through_missing_ids(ids in unique_ids(), right in 0usize..12) {
        let formats = catalogue(&ids);
        let right_id = &formats[right % formats.len()].format_id;
        let spec = format!("missing/{}", right_id);
        prop_assert_eq!(pick(&spec, &formats), vec![right_id.clone()]);
    }

    #[test]
    fn filters_keep_only_matching_formats(ids in unique_ids()) {
        let formats = catalogue(&ids);
        let picked = pick("all[ext=webm]", &formats);
        prop_assert!(picked.len() <= formats.len());
        for id in &picked {
            let f = formats.iter().find(|f| &f.format_id == id).unwrap();
            prop_assert_eq!(f.ext.as_str(), "webm");
        }
        prop_assert_eq!(picked.len(), formats.len() / 2);
    }

    #[test]
    fn compiled_expression_keeps_its_text(name in "[a-z][a-z0-9]{0,8}") {
        let selector = FormatSelector::compile(&name).unwrap();
        prop_assert_eq!(selector.spec(), name.as_str());
        prop_assert_eq!(selector.selectors().len(), 1);
    }
}
