//! テキスト → 値の変換

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use crate::error::ScraperError;

/// 記号・空白の連続
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").expect("valid regex"));

/// 要素のテキスト（前後空白除去）
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// 空白区切りの先頭トークン
pub fn first_token(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

/// 価格テキストを (通貨, 金額) に分割
///
/// - `"AED 123.45"` → `("AED", 123.45)`
/// - `"45.00"` → `("", 45.0)`
/// - `"AED 1 234,56"` → `("AED", 1234.56)`
pub fn parse_price(text: &str) -> Result<(String, f64), ScraperError> {
    let text = text.trim();
    let (currency, amount) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) if !starts_with_digit(head) => (head, rest),
        _ => ("", text),
    };
    let amount = parse_amount(amount)?;
    Ok((currency.to_string(), amount))
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// 桁区切り・小数点カンマを許容して金額をパース
pub fn parse_amount(text: &str) -> Result<f64, ScraperError> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    let normalized = match (compact.rfind(','), compact.rfind('.')) {
        // 後ろにある方が小数点
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(comma), None) => {
            let decimals = compact.len() - comma - 1;
            if compact.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                compact.replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
        (None, Some(_)) if compact.matches('.').count() > 1 => compact.replace('.', ""),
        _ => compact,
    };

    let amount = normalized
        .parse::<f64>()
        .map_err(|e| ScraperError::Extraction(format!("金額をパースできません {:?}: {}", text, e)))?;
    finite(amount, "金額", text)
}

/// NaN・無限大は数値として扱わない
fn finite(value: f64, what: &str, text: &str) -> Result<f64, ScraperError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScraperError::Extraction(format!(
            "{}が有限の数値ではありません: {:?}",
            what, text
        )))
    }
}

/// 評価テキスト（"4.5 out of 5 stars"）の先頭トークン
pub fn parse_review_score(text: &str) -> Result<f64, ScraperError> {
    let token = first_token(text)
        .ok_or_else(|| ScraperError::Extraction("評価テキストが空です".into()))?;
    let score = token
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| ScraperError::Extraction(format!("評価をパースできません {:?}: {}", text, e)))?;
    finite(score, "評価", text)
}

/// パンくずラベルの記号をまとめて空白区切りに正規化
pub fn normalize_breadcrumb_label(label: &str) -> Option<String> {
    let words: Vec<&str> = NON_WORD.split(label).filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// 「Brand: Purina」形式から値を取り出す
pub fn clean_brand(text: &str) -> Option<String> {
    let value = text.rsplit(':').next().unwrap_or(text).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_with_currency() {
        assert_eq!(parse_price("AED 123.45").unwrap(), ("AED".to_string(), 123.45));
        assert_eq!(parse_price("AED\u{a0}99").unwrap(), ("AED".to_string(), 99.0));
    }

    #[test]
    fn test_parse_price_without_currency() {
        assert_eq!(parse_price("45.00").unwrap(), (String::new(), 45.0));
        assert_eq!(parse_price("1 234,56").unwrap(), (String::new(), 1234.56));
    }

    #[test]
    fn test_parse_price_separators() {
        assert_eq!(parse_price("AED 1 234,56").unwrap().1, 1234.56);
        assert_eq!(parse_price("AED 1,234.56").unwrap().1, 1234.56);
        assert_eq!(parse_price("EUR 1.234,56").unwrap().1, 1234.56);
        assert_eq!(parse_price("AED 1,234").unwrap().1, 1234.0);
        assert_eq!(parse_price("12,5").unwrap().1, 12.5);
    }

    #[test]
    fn test_parse_price_invalid() {
        assert!(parse_price("AED").is_err());
        assert!(parse_price("").is_err());
        assert!(parse_price("AED abc").is_err());
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        assert!(parse_price("AED NaN").is_err());
        assert!(parse_price("inf").is_err());
        assert!(parse_price("AED -infinity").is_err());
        assert!(parse_review_score("NaN out of 5 stars").is_err());
    }

    #[test]
    fn test_review_score() {
        assert_eq!(parse_review_score("4.5 out of 5 stars").unwrap(), 4.5);
        assert_eq!(parse_review_score("4,2 von 5 Sternen").unwrap(), 4.2);
        assert!(parse_review_score("").is_err());
        assert!(parse_review_score("stars").is_err());
    }

    #[test]
    fn test_breadcrumb_label() {
        assert_eq!(
            normalize_breadcrumb_label("Dogs & Puppies").as_deref(),
            Some("Dogs Puppies")
        );
        assert_eq!(normalize_breadcrumb_label(" › ").as_deref(), None);
        assert_eq!(normalize_breadcrumb_label("Wet-Food").as_deref(), Some("Wet Food"));
    }

    #[test]
    fn test_clean_brand() {
        assert_eq!(clean_brand("Brand: Purina").as_deref(), Some("Purina"));
        assert_eq!(clean_brand("Whiskas").as_deref(), Some("Whiskas"));
        assert_eq!(clean_brand("Brand:  ").as_deref(), None);
    }
}
