//! Extraction and assembly of whole detail documents

use listing_harvest::assemble::assemble;
use listing_harvest::extract::extract_fields;
use listing_harvest::model::{GeoPoint, Number, RawDetailDocument};
use serde_json::json;

const DETAIL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>آپارتمان ۱۲۰ متری در سعادت آباد - دیوار</title>
  <meta property="og:image" content="https://cdn.example.com/static/og.jpg">
  <script type="application/ld+json">
    {"@type": "Product", "geo": {"latitude": "35.78", "longitude": "51.37"},
     "image": "https://cdn.example.com/static/ld.jpg"}
  </script>
</head>
<body>
  <div class="kt-page-title">
    <h1 class="kt-page-title__title">آپارتمان ۱۲۰ متری در سعادت آباد</h1>
  </div>
  <div class="kt-carousel">
    <picture>
      <source srcset="/static/pic-small.webp 400w, /static/pic-large.webp 1200w">
      <img src="/static/pic.jpg">
    </picture>
    <img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=">
  </div>
  <div class="kt-description-row">
    <p class="kt-description-row__text">واحد نوساز، نورگیر</p>
  </div>
  <table class="kt-group-row">
    <thead><tr><th>متراژ</th><th>ساخت</th><th>اتاق</th></tr></thead>
    <tbody><tr><td>۱۲۰</td><td>۱۳۹۸</td><td>۲</td></tr></tbody>
  </table>
  <div class="kt-unexpandable-row">
    <p class="kt-unexpandable-row__title">قیمت کل</p>
    <p class="kt-unexpandable-row__value">۸٬۴۰۰٬۰۰۰٬۰۰۰ تومان</p>
  </div>
  <div class="kt-unexpandable-row">
    <p class="kt-unexpandable-row__title">طبقه</p>
    <p class="kt-unexpandable-row__value">۳ از ۵</p>
  </div>
  <div class="kt-feature-row"><span class="kt-feature-row__title">پارکینگ</span></div>
  <div class="kt-feature-row kt-feature-row--disabled"><span class="kt-feature-row__title">انباری ندارد</span></div>
  <div class="kt-feature-row"><span class="kt-feature-row__title">جنس کف سرامیک</span></div>
</body>
</html>"#;

#[test]
fn test_full_markup_document() {
    let raw = RawDetailDocument::from_markup("AaB1", DETAIL_PAGE).with_url("https://example.com/v/AaB1");
    let record = assemble(extract_fields(&raw)).unwrap();

    assert_eq!(record.identifier.as_str(), "AaB1");
    assert_eq!(record.title, "آپارتمان ۱۲۰ متری در سعادت آباد");
    assert_eq!(record.description.as_deref(), Some("واحد نوساز، نورگیر"));

    assert!(record
        .image_urls
        .contains(&"https://example.com/static/pic-large.webp".to_string()));
    assert!(record
        .image_urls
        .contains(&"https://example.com/static/pic.jpg".to_string()));
    assert!(!record.image_urls.iter().any(|u| u.contains("pic-small")));
    assert!(!record.image_urls.iter().any(|u| u.starts_with("data:")));

    assert_eq!(record.latitude, Some(35.78));
    assert_eq!(record.longitude, Some(51.37));

    assert_eq!(record.area, Some(Number::Int(120)));
    assert_eq!(record.year_built, Some(Number::Int(1398)));
    assert_eq!(record.bedrooms, Some(Number::Int(2)));
    assert_eq!(record.price, Some(Number::Int(8_400_000_000)));
    assert_eq!(record.floor_info.as_deref(), Some("۳ از ۵"));
    assert_eq!(record.floor_material.as_deref(), Some("سرامیک"));

    assert!(record.has_parking);
    assert!(!record.has_storage);
    assert!(!record.has_balcony);

    // No row named the category, so the classifier did
    assert_eq!(record.property_type.as_deref(), Some("آپارتمان"));
    assert!(record
        .attributes
        .iter()
        .any(|a| a.title == "نوع ملک" && a.value.as_deref() == Some("آپارتمان")));
}

#[test]
fn test_payload_rows_win_over_markup_rows() {
    let markup = r#"<html><body>
        <h1>Garden villa</h1>
        <table class="kt-group-row">
          <thead><tr><th>متراژ</th></tr></thead>
          <tbody><tr><td>۱۲۰</td></tr></tbody>
        </table>
    </body></html>"#;
    let payload = json!({"sections": [{"widgets": [
        {"widget_type": "GROUP_INFO_ROW", "data": {"items": [
            {"title": "متراژ", "value": "۹۰"}
        ]}}
    ]}]});
    let raw = RawDetailDocument::from_markup("x", markup).with_payload(payload);
    let record = assemble(extract_fields(&raw)).unwrap();

    assert_eq!(record.area, Some(Number::Int(90)));
    let area_rows = record.attributes.iter().filter(|a| a.title == "متراژ").count();
    assert_eq!(area_rows, 1);
}

#[test]
fn test_nested_rows_fill_remaining_slots() {
    let payload = json!({"sections": [
        {"widgets": [{"widget_type": "TITLE_ROW", "data": {"title": "ویلا دوبلکس"}}]},
        {"widgets": [{"widget_type": "GROUP_FEATURE_ROW", "data": {
            "items": [
                {"title": "بالکن", "available": true, "icon": {"icon_name": "BALCONY"}}
            ],
            "action": {"type": "LOAD_MODAL_PAGE", "payload": {"modal_page": {"widget_list": [
                {"widget_type": "UNEXPANDABLE_ROW", "data": {"title": "سند", "value": "تک‌برگ"}},
                {"widget_type": "FEATURE_ROW", "data": {"title": "گرمایش شوفاژ", "icon": {"icon_name": "SUNNY"}}},
                {"widget_type": "FEATURE_ROW", "data": {"title": "سرمایش کولر آبی"}}
            ]}}}
        }}]}
    ]});
    let raw = RawDetailDocument {
        identifier: "V1".into(),
        markup: None,
        payload: Some(payload),
        url: None,
    };
    let record = assemble(extract_fields(&raw)).unwrap();

    assert_eq!(record.title, "ویلا دوبلکس");
    assert!(record.has_balcony);
    assert_eq!(record.title_deed_type.as_deref(), Some("تک‌برگ"));
    assert_eq!(record.heating_system.as_deref(), Some("شوفاژ"));
    // No icon key: only reachable in the backfill pass
    assert_eq!(record.cooling_system.as_deref(), Some("کولر آبی"));
    assert_eq!(record.property_type.as_deref(), Some("ویلا"));
}

#[test]
fn test_title_falls_back_to_page_metadata() {
    let markup = r#"<html><head>
        <meta property="og:title" content="Two bedroom flat | Marketplace">
        <title>Ignored - Marketplace</title>
    </head><body><p>short</p></body></html>"#;
    let raw = RawDetailDocument::from_markup("x", markup);
    let fields = extract_fields(&raw);
    assert_eq!(fields.title.as_deref(), Some("Two bedroom flat"));

    let markup = r#"<html><head><title>Studio near the park - Marketplace</title></head></html>"#;
    let raw = RawDetailDocument::from_markup("x", markup);
    assert_eq!(
        extract_fields(&raw).title.as_deref(),
        Some("Studio near the park")
    );
}

#[test]
fn test_description_falls_back_to_longest_paragraph() {
    let markup = r#"<html><body><main>
        <h1>Flat</h1>
        <p>Too short to count.</p>
        <p>A bright apartment on the third floor with an open kitchen and a view of the hills.</p>
        <p>Another paragraph that is long enough but shorter than the best one.</p>
    </main></body></html>"#;
    let raw = RawDetailDocument::from_markup("x", markup);
    let record = assemble(extract_fields(&raw)).unwrap();

    assert_eq!(
        record.description.as_deref(),
        Some("A bright apartment on the third floor with an open kitchen and a view of the hills.")
    );
}

#[test]
fn test_app_state_supplies_rows_and_location() {
    let markup = r#"<html><body>
        <h1>زمین ۵۰۰ متری</h1>
        <script>window.__PRELOADED_STATE__ = {"post": {"detail": {
            "sections": [{"widgets": [
                {"widget_type": "UNEXPANDABLE_ROW", "data": {"title": "متراژ زمین", "value": "۵۰۰ متر"}}
            ]}],
            "map": {"latitude": 36.2, "longitude": 52.1}
        }}};</script>
    </body></html>"#;
    let raw = RawDetailDocument::from_markup("L1", markup);
    let fields = extract_fields(&raw);

    assert_eq!(fields.location, GeoPoint::new(36.2, 52.1));

    let record = assemble(fields).unwrap();
    assert_eq!(record.land_area, Some(Number::Int(500)));
    assert_eq!(record.property_type.as_deref(), Some("زمین"));
}

#[test]
fn test_unresolved_title_is_rejected() {
    let raw = RawDetailDocument::from_markup("x", "<html><body><div>empty</div></body></html>");
    assert!(assemble(extract_fields(&raw)).is_err());
}
