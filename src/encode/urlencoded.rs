//! `application/x-www-form-urlencoded` serialization.

use url::form_urlencoded::byte_serialize;

use crate::charset::Charset;

/// Encodes `name=value` pairs with `charset`, joined by `&`.
///
/// Spaces become `+`; every byte outside the unreserved set is
/// percent-encoded after conversion to `charset`.
pub fn encode_pairs<'a, I>(pairs: I, charset: Charset) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                encode_component(name, charset),
                encode_component(value, charset)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encodes a single component.
pub fn encode_component(text: &str, charset: Charset) -> String {
    byte_serialize(&charset.encode(text)).collect()
}

/// Appends an encoded query string to `url`'s existing query.
pub fn append_query(url: &mut url::Url, encoded: &str) {
    if encoded.is_empty() {
        return;
    }
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
        _ => encoded.to_string(),
    };
    url.set_query(Some(&query));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pairs_utf8() {
        let encoded = encode_pairs([("name", "a b"), ("q", "x&y=z")], Charset::utf8());
        assert_eq!(encoded, "name=a+b&q=x%26y%3Dz");
    }

    #[test]
    fn test_encode_pairs_other_charset() {
        let gbk = Charset::for_label("GBK").expect("gbk");
        assert_eq!(encode_pairs([("k", "中")], gbk), "k=%D6%D0");
        assert_eq!(encode_pairs([("k", "中")], Charset::utf8()), "k=%E4%B8%AD");
    }

    #[test]
    fn test_duplicate_keys_preserved() {
        let encoded = encode_pairs([("a", "1"), ("a", "2")], Charset::utf8());
        assert_eq!(encoded, "a=1&a=2");
    }

    #[test]
    fn test_append_query() {
        let mut url = url::Url::parse("http://h/p").expect("url");
        append_query(&mut url, "a=1");
        assert_eq!(url.as_str(), "http://h/p?a=1");
        append_query(&mut url, "b=2");
        assert_eq!(url.as_str(), "http://h/p?a=1&b=2");
        append_query(&mut url, "");
        assert_eq!(url.as_str(), "http://h/p?a=1&b=2");
    }
}
