//! マーケットプレイスのページ構造に依存するCSSセレクタ
//!
//! ページ構造が変わった場合はここを更新する。

use std::sync::LazyLock;

use scraper::Selector;

fn parse(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
}

/// 検索結果（一覧）ページ
pub mod listing {
    use super::*;

    /// 検索結果スロット（ページ準備完了の判定に使う）
    pub const RESULTS_SLOT: &str = "div.s-main-slot";
    pub const ITEM: &str = "div.a-section.a-spacing-base";
    pub const LINK: &str = "a.a-link-normal";
    pub const NAME: &str = "h2 span";
    pub const IMAGE: &str = "span[data-component-type=\"s-product-image\"] img.s-image";
    pub const PRICE: &str = ".a-price .a-offscreen";
    pub const PAGINATION_ITEM: &str = ".s-pagination-item";
    pub const NEXT: &str = "a.s-pagination-next";

    pub static ITEM_SEL: LazyLock<Selector> = LazyLock::new(|| parse(ITEM));
    pub static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| parse(LINK));
    pub static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| parse(NAME));
    pub static IMAGE_SEL: LazyLock<Selector> = LazyLock::new(|| parse(IMAGE));
    pub static PRICE_SEL: LazyLock<Selector> = LazyLock::new(|| parse(PRICE));
    pub static PAGINATION_ITEM_SEL: LazyLock<Selector> =
        LazyLock::new(|| parse(PAGINATION_ITEM));
    pub static NEXT_SEL: LazyLock<Selector> = LazyLock::new(|| parse(NEXT));
}

/// 商品詳細ページ
pub mod detail {
    use super::*;

    pub const BREADCRUMBS: &str = "div#desktop-breadcrumbs_feature_div";
    pub const PRODUCT: &str = "div#ppd";
    pub const BREADCRUMB_ITEM: &str =
        "div#desktop-breadcrumbs_feature_div ul.a-unordered-list.a-horizontal.a-size-small span.a-list-item";
    pub const TITLE: &str = "div#centerCol span#productTitle";
    pub const REVIEW_SCORE: &str = "div#centerCol div#averageCustomerReviews span.a-icon-alt";
    pub const TOTAL_REVIEWS: &str =
        "div#centerCol div#averageCustomerReviews span#acrCustomerReviewText";
    pub const BRAND: &str = "tr.po-brand td.a-span9";
    pub const BYLINE: &str = "a#bylineInfo";
    pub const ABOUT: &str = "div#feature-bullets ul.a-unordered-list.a-vertical li";
    pub const DESCRIPTION: &str = "div#productDescription_feature_div div#productDescription";

    /// 詳細抽出前に出現を待つコンテナ
    pub const READY: [&str; 2] = [BREADCRUMBS, PRODUCT];

    pub static BREADCRUMB_ITEM_SEL: LazyLock<Selector> =
        LazyLock::new(|| parse(BREADCRUMB_ITEM));
    pub static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| parse(TITLE));
    pub static REVIEW_SCORE_SEL: LazyLock<Selector> = LazyLock::new(|| parse(REVIEW_SCORE));
    pub static TOTAL_REVIEWS_SEL: LazyLock<Selector> = LazyLock::new(|| parse(TOTAL_REVIEWS));
    pub static BRAND_SEL: LazyLock<Selector> = LazyLock::new(|| parse(BRAND));
    pub static BYLINE_SEL: LazyLock<Selector> = LazyLock::new(|| parse(BYLINE));
    pub static ABOUT_SEL: LazyLock<Selector> = LazyLock::new(|| parse(ABOUT));
    pub static DESCRIPTION_SEL: LazyLock<Selector> = LazyLock::new(|| parse(DESCRIPTION));
}
