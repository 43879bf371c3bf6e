//! フィールド抽出モジュール
//!
//! レンダリング済みHTMLから一覧レコード・詳細フィールドをベストエフォートで取り出す。
//! HTMLのパースは同期関数内で完結させ、await をまたいで DOM を保持しない。

mod detail;
mod listing;
pub mod parse;
pub mod selectors;

pub use detail::extract_detail;
pub use listing::{extract_listing, parse_listing_page, ItemResult, ListingContext, ListingPage};
