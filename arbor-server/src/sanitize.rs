use std::collections::{HashMap, HashSet};

/// Strip comment text down to the allowed markup: links, code, italics
/// and strong emphasis, with href/title kept on links. Disallowed tags
/// are dropped but their text content survives, except script/style
/// whose content is discarded outright. Never fails: the result is
/// always a best-effort cleaned string.
pub fn clean(text: &str) -> String {
    let tags: HashSet<&str> = ["a", "code", "i", "strong"].into_iter().collect();
    let mut tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    tag_attributes.insert("a", ["href", "title"].into_iter().collect());
    ammonia::Builder::new()
        .tags(tags)
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .link_rel(None)
        .clean(text)
        .to_string()
}

/// Check a markup fragment for well-formedness by wrapping it in a
/// synthetic root element and running an XML parse over the result.
/// Not part of the submission path; submissions are cleaned, never
/// rejected, for their markup.
pub fn is_well_formed(fragment: &str) -> bool {
    let wrapped = format!("<root>{}</root>", fragment);
    let mut reader = quick_xml::Reader::from_str(&wrapped);
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Eof) => return true,
            Ok(_) => (),
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_keeps_allowed_markup() {
        assert_eq!(
            clean("<script>alert(1)</script><strong>hi</strong>"),
            "<strong>hi</strong>"
        );
    }

    #[test]
    fn keeps_whole_allow_list() {
        let text = "<a href=\"https://example.com\" title=\"x\">l</a><code>c</code><i>i</i>";
        assert_eq!(clean(text), text);
    }

    #[test]
    fn drops_disallowed_attributes() {
        assert_eq!(
            clean("<a href=\"/x\" onclick=\"evil()\">go</a>"),
            "<a href=\"/x\">go</a>"
        );
    }

    #[test]
    fn unknown_tags_keep_their_content() {
        assert_eq!(clean("<div><em>kept</em> text</div>"), "kept text");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean("no markup here"), "no markup here");
    }

    #[test]
    fn well_formedness_check() {
        assert!(is_well_formed("<strong>ok</strong>"));
        assert!(is_well_formed("plain text"));
        assert!(is_well_formed("<em>nested <i>fine</i></em>"));
        assert!(!is_well_formed("<strong>unclosed"));
        assert!(!is_well_formed("<i>mismatched</em>"));
    }
}
