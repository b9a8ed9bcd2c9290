//! Text normalization shared by the extractors and the name resolver.

/// Characters that mark a price in Japanese listing text.
const CURRENCY_MARKERS: [char; 3] = ['円', '¥', '￥'];

/// Words that describe the offer rather than the product.
const CONDITION_WORDS: [&str; 12] = [
    "新品",
    "中古",
    "未使用",
    "未開封",
    "美品",
    "送料無料",
    "即日発送",
    "国内正規品",
    "正規品",
    "new",
    "used",
    "brand-new",
];

/// Bracket pairs whose whole content is a promotional tag.
const TAG_BRACKETS: [(char, char); 4] = [('【', '】'), ('[', ']'), ('［', '］'), ('〔', '〕')];

const DECORATIONS: &str = "()（）「」『』<>＜＞《》★☆◆◇■□●○◎♪!！|｜・~〜";

pub const DEFAULT_PHRASE_TOKENS: usize = 3;

pub fn has_currency_marker(text: &str) -> bool {
    text.chars().any(|c| CURRENCY_MARKERS.contains(&c))
}

fn to_ascii_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32),
        _ => None,
    }
}

/// Parses the first number in a price string, ignoring currency symbols and
/// thousands separators. `"¥12,800円"`, `"12800円"` and `"12,800"` all give
/// `12800`. Text without digits gives `None`, never zero.
pub fn parse_price(text: &str) -> Option<u64> {
    let mut digits = String::new();
    let mut started = false;

    for c in text.chars() {
        if let Some(d) = to_ascii_digit(c) {
            digits.push(d);
            started = true;
        } else if started && matches!(c, ',' | '，') {
            continue;
        } else if started {
            break;
        }
    }

    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn is_amount(token: &str) -> bool {
    token.chars().any(|c| to_ascii_digit(c).is_some())
        && token
            .chars()
            .all(|c| to_ascii_digit(c).is_some() || matches!(c, ',' | '，'))
}

/// Finds the currency-marked amount in a line of listing text and returns
/// it with the rest of the line. `"Apple iPhone 13 ¥30,000"` gives
/// `(30000, "Apple iPhone 13")`; a detached marker (`"30,000 円"`,
/// `"¥ 30,000"`) takes the neighbouring amount with it.
pub fn split_price(line: &str) -> Option<(u64, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    for (i, token) in tokens.iter().enumerate() {
        if !has_currency_marker(token) {
            continue;
        }
        let (price, consumed) = match parse_price(token) {
            Some(price) => (Some(price), vec![i]),
            None => {
                let before = i.checked_sub(1).filter(|&j| is_amount(tokens[j]));
                let after = Some(i + 1).filter(|&j| j < tokens.len() && is_amount(tokens[j]));
                match before.or(after) {
                    Some(j) => (parse_price(tokens[j]), vec![i, j]),
                    None => (None, vec![i]),
                }
            }
        };
        if let Some(price) = price {
            let rest = tokens
                .iter()
                .enumerate()
                .filter(|(j, _)| !consumed.contains(j))
                .map(|(_, t)| *t)
                .collect::<Vec<_>>()
                .join(" ");
            return Some((price, rest));
        }
    }

    None
}

/// Splits element text into trimmed, non-empty lines.
pub fn text_lines<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    fragments
        .into_iter()
        .flat_map(|f| f.lines())
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect()
}

fn strip_tag_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut closers: Vec<char> = Vec::new();

    for c in text.chars() {
        if let Some(&(_, close)) = TAG_BRACKETS.iter().find(|(open, _)| *open == c) {
            closers.push(close);
            out.push(' ');
        } else if closers.last() == Some(&c) {
            closers.pop();
        } else if closers.is_empty() {
            out.push(c);
        }
    }

    out
}

/// Turns a catalogue product name into a short search phrase: promotional
/// bracket tags removed, decoration characters blanked, condition words
/// dropped, first `max_tokens` tokens kept.
pub fn shorten_search_phrase(name: &str, max_tokens: usize) -> Option<String> {
    let stripped: String = strip_tag_brackets(name)
        .chars()
        .map(|c| if DECORATIONS.contains(c) { ' ' } else { c })
        .collect();

    let tokens: Vec<&str> = stripped
        .split_whitespace()
        .filter(|t| {
            let lower = t.to_lowercase();
            !CONDITION_WORDS.iter().any(|w| lower == *w)
        })
        .take(max_tokens)
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_formats() {
        assert_eq!(parse_price("¥12,800円"), Some(12800));
        assert_eq!(parse_price("12800円"), Some(12800));
        assert_eq!(parse_price("12,800"), Some(12800));
        assert_eq!(parse_price("￥１２，８００"), Some(12800));
        assert_eq!(parse_price("税込 3,980円 (送料別)"), Some(3980));
    }

    #[test]
    fn test_parse_price_without_digits() {
        assert_eq!(parse_price("SOLD OUT"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("円"), None);
    }

    #[test]
    fn test_parse_price_is_idempotent() {
        let once = parse_price("¥12,800円").unwrap();
        assert_eq!(parse_price(&once.to_string()), Some(once));
    }

    #[test]
    fn test_currency_marker() {
        assert!(has_currency_marker("12,800円"));
        assert!(has_currency_marker("¥500"));
        assert!(!has_currency_marker("128GB"));
    }

    #[test]
    fn test_split_price_keeps_the_name() {
        assert_eq!(
            split_price("Apple iPhone 13 128GB ¥30,000"),
            Some((30000, "Apple iPhone 13 128GB".to_string()))
        );
        assert_eq!(split_price("36,500円"), Some((36500, String::new())));
        assert_eq!(
            split_price("iPad mini 30,000 円 税込"),
            Some((30000, "iPad mini 税込".to_string()))
        );
        assert_eq!(split_price("¥ 12,800"), Some((12800, String::new())));
        assert_eq!(split_price("iPhone 13 128GB"), None);
        assert_eq!(split_price("価格 円"), None);
    }

    #[test]
    fn test_text_lines() {
        let lines = text_lines(["  Apple iPhone 13  ", "\n", "12,800円\n税込"]);
        assert_eq!(lines, vec!["Apple iPhone 13", "12,800円", "税込"]);
    }

    #[test]
    fn test_shorten_search_phrase() {
        assert_eq!(
            shorten_search_phrase("【送料無料】新品 Apple iPhone 13 128GB ミッドナイト", 3),
            Some("Apple iPhone 13".to_string())
        );
        assert_eq!(
            shorten_search_phrase("[中古] ★Nintendo Switch★ 本体 used", 3),
            Some("Nintendo Switch 本体".to_string())
        );
        assert_eq!(shorten_search_phrase("【新品】 中古", 3), None);
    }
}
