//! 商品詳細ページの抽出

use scraper::Html;

use super::parse::{
    clean_brand, element_text, first_token, normalize_breadcrumb_label, parse_review_score,
};
use super::selectors::detail as sel;
use crate::schema;
use crate::types::{DetailFields, Extracted};

/// 詳細ページから付加情報を抽出（失敗しない）
///
/// 各サブフィールドは独立して抽出し、取れなかったものは既定値のまま
/// `"field: selector"` を errors に積む。
pub fn extract_detail(html: &str) -> Extracted<DetailFields> {
    let document = Html::parse_document(html);
    let mut errors = Vec::new();
    let mut detail = DetailFields::default();

    detail.amazon_category = extract_breadcrumb(&document);
    if detail.amazon_category.is_none() {
        errors.push(tag(schema::AMAZON_CATEGORY.name, sel::BREADCRUMB_ITEM));
    }

    detail.title = document
        .select(&sel::TITLE_SEL)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    match document.select(&sel::REVIEW_SCORE_SEL).next().map(element_text) {
        Some(text) => match parse_review_score(&text) {
            Ok(score) => detail.review_score = score,
            Err(_) => errors.push(tag(schema::REVIEW_SCORE.name, sel::REVIEW_SCORE)),
        },
        None => errors.push(tag(schema::REVIEW_SCORE.name, sel::REVIEW_SCORE)),
    }

    match document
        .select(&sel::TOTAL_REVIEWS_SEL)
        .next()
        .map(element_text)
        .and_then(|text| first_token(&text).map(str::to_string))
    {
        Some(total) => detail.total_reviews = total,
        None => errors.push(tag(schema::TOTAL_REVIEWS.name, sel::TOTAL_REVIEWS)),
    }

    detail.brand = document
        .select(&sel::BRAND_SEL)
        .next()
        .or_else(|| document.select(&sel::BYLINE_SEL).next())
        .and_then(|el| clean_brand(&element_text(el)));
    if detail.brand.is_none() {
        errors.push(tag(schema::BRAND.name, sel::BRAND));
    }

    let bullets: Vec<String> = document
        .select(&sel::ABOUT_SEL)
        .map(element_text)
        .filter(|b| !b.is_empty())
        .collect();
    if bullets.is_empty() {
        errors.push(tag(schema::ABOUT.name, sel::ABOUT));
    } else {
        detail.about = bullets.join("\n\n");
    }

    match document.select(&sel::DESCRIPTION_SEL).next().map(element_text) {
        Some(text) if !text.is_empty() => detail.description = text,
        _ => errors.push(tag(schema::DESCRIPTION.name, sel::DESCRIPTION)),
    }

    Extracted {
        value: detail,
        errors,
    }
}

fn tag(field: &str, selector: &str) -> String {
    format!("{}: {}", field, selector)
}

/// 先頭（ルート）以外のパンくずをタブ区切りで連結
fn extract_breadcrumb(document: &Html) -> Option<String> {
    let labels: Vec<String> = document
        .select(&sel::BREADCRUMB_ITEM_SEL)
        .skip(1)
        .filter_map(|el| normalize_breadcrumb_label(&element_text(el)))
        .collect();

    if labels.is_empty() {
        None
    } else {
        Some(labels.join("\t"))
    }
}
