//! Minimal `<img>` tag scanner.
//!
//! Not a general HTML parser: it walks the text once, skips comments and
//! raw-text elements, and collects the attributes of every `img` start tag.

/// Attributes of one `<img>` tag, names lowercased, values entity-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImgTag {
    attrs: Vec<(String, String)>,
}

impl ImgTag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_all_classes(&self, wanted: &str) -> bool {
        let mut wanted = wanted.split_ascii_whitespace().peekable();
        if wanted.peek().is_none() {
            return false;
        }
        wanted.all(|name| self.classes().any(|class| class == name))
    }

    pub fn dimension(&self, name: &str) -> Option<u32> {
        self.attr(name)?.trim().trim_end_matches("px").parse().ok()
    }
}

/// Every `<img>` start tag in document order.
pub fn img_tags(html: &str) -> Vec<ImgTag> {
    let mut tags = Vec::new();
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        rest = &rest[lt..];
        if let Some(after) = rest.strip_prefix("<!--") {
            rest = match after.find("-->") {
                Some(end) => &after[end + 3..],
                None => "",
            };
            continue;
        }
        let name_len = rest[1..]
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len() - 1);
        let name = rest[1..1 + name_len].to_ascii_lowercase();
        let Some((attrs, consumed)) = parse_attrs(&rest[1 + name_len..]) else {
            break;
        };
        rest = &rest[1 + name_len + consumed..];
        match name.as_str() {
            "img" => tags.push(ImgTag { attrs }),
            "script" | "style" | "textarea" => rest = skip_raw_text(rest, &name),
            _ => {},
        }
    }
    tags
}

/// Parse attributes up to and including the closing `>`. Returns the
/// attributes and the number of bytes consumed, or `None` if the tag never
/// closes.
fn parse_attrs(input: &str) -> Option<(Vec<(String, String)>, usize)> {
    let bytes = input.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        if bytes[i] == b'>' {
            return Some((attrs, i + 1));
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = input[name_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let start = i + 1;
                    let end = input[start..].find(quote as char)? + start;
                    value = decode_entities(&input[start..end]);
                    i = end + 1;
                },
                Some(_) => {
                    let start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&input[start..i]);
                },
                None => return None,
            }
        }
        if !name.is_empty() && !attrs.iter().any(|(key, _)| *key == name) {
            attrs.push((name, value));
        }
    }
}

fn skip_raw_text<'a>(input: &'a str, name: &str) -> &'a str {
    let closing = format!("</{name}");
    let lower = input.to_ascii_lowercase();
    match lower.find(&closing) {
        Some(pos) => &input[pos..],
        None => "",
    }
}

/// Decode named and numeric character references common in attributes.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..]
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_reference(&rest[1..1 + semi]).map(|c| (c, semi + 2)));
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            },
            None => {
                out.push('&');
                rest = &rest[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => return None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn collects_img_attributes() {
        let tags = img_tags(
            r#"<div><IMG ID="main" Class='a b' src=/x.jpg alt="A &amp; B" width="640"></div>
               <img src="/y.png" data-zoom />"#,
        );
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].id(), Some("main"));
        assert_eq!(tags[0].attr("src"), Some("/x.jpg"));
        assert_eq!(tags[0].attr("alt"), Some("A & B"));
        assert_eq!(tags[0].dimension("width"), Some(640));
        assert_eq!(tags[1].attr("data-zoom"), Some(""));
        assert_eq!(tags[1].attr("src"), Some("/y.png"));
    }

    #[test]
    fn skips_comments_and_scripts() {
        let html = r#"<!-- <img src="hidden.jpg"> -->
            <script>var s = '<img src="fake.jpg">';</script>
            <image src="not-an-img.svg">
            <img src="real.jpg">"#;
        let tags = img_tags(html);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].attr("src"), Some("real.jpg"));
    }

    #[test]
    fn unterminated_tag_stops_scan() {
        assert!(img_tags(r#"<img src="a.jpg"#).is_empty());
        assert!(img_tags("text < more text").is_empty());
    }

    #[test]
    fn first_duplicate_attribute_wins() {
        let tags = img_tags(r#"<img src="one.jpg" src="two.jpg">"#);
        assert_eq!(tags[0].attr("src"), Some("one.jpg"));
    }

    #[rstest]
    #[case("a b", "a", true)]
    #[case("a b", "b a", true)]
    #[case("a b", "a c", false)]
    #[case("ab", "a", false)]
    #[case("a", "", false)]
    fn class_matching(#[case] class: &str, #[case] wanted: &str, #[case] expected: bool) {
        let tags = img_tags(&format!(r#"<img class="{class}">"#));
        assert_eq!(tags[0].has_all_classes(wanted), expected);
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("a&amp;b", "a&b")]
    #[case("&lt;&gt;&quot;&apos;", "<>\"'")]
    #[case("&#39;&#x41;&#X42;", "'AB")]
    #[case("fish & chips", "fish & chips")]
    #[case("&unknown;", "&unknown;")]
    #[case("?a=1&b=2", "?a=1&b=2")]
    fn entities(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(decode_entities(input), expected);
    }
}
