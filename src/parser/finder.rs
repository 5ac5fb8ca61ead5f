//! Stateless lookups over a parsed [`Message`].
//!
//! All "first" queries follow pre-order, root included.

use crate::model::mail::{Message, Part, PartSet};

/// Content types reserved for the body; never extracted as attachments.
pub const BODY_CONTENT_TYPES: [&str; 2] = ["text/html", "text/plain"];

/// First part whose content type is exactly `content_type`.
pub fn first_by_content_type<'a>(msg: &'a Message, content_type: &str) -> Option<&'a Part> {
    msg.all_parts().find(|p| p.content_type == content_type)
}

/// First part whose Content-ID is `cid` or `<cid>`.
pub fn first_by_content_id<'a>(msg: &'a Message, cid: &str) -> Option<&'a Part> {
    let bracketed = format!("<{cid}>");
    msg.all_parts().find(|p| {
        p.content_id
            .as_deref()
            .is_some_and(|id| id == cid || id == bracketed)
    })
}

/// First part whose Content-Type `name` parameter equals `name`.
pub fn first_by_content_type_name<'a>(msg: &'a Message, name: &str) -> Option<&'a Part> {
    msg.all_parts().find(|p| p.param("name") == Some(name))
}

/// Leaf parts outside `exclude` that are not body text.
pub fn attachment_candidates(msg: &Message, exclude: &PartSet) -> PartSet {
    msg.all_parts()
        .filter(|p| !p.is_multipart())
        .filter(|p| !exclude.contains(&p.id))
        .filter(|p| !BODY_CONTENT_TYPES.contains(&p.content_type.as_str()))
        .map(|p| p.id)
        .collect()
}

/// The members of `parts` that declare a filename.
pub fn filenamed_parts(msg: &Message, parts: &PartSet) -> PartSet {
    parts
        .iter()
        .copied()
        .filter(|id| msg.part(*id).filename.is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mail::PartId;
    use crate::parser::mime::parse_message;

    const MSG: &[u8] = b"Content-Type: multipart/related; boundary=\"r\"\r\n\
\r\n\
--r\r\n\
Content-Type: text/html\r\n\
\r\n\
<img src=\"cid:logo@x\">\r\n\
--r\r\n\
Content-Type: image/png; name=\"logo.png\"\r\n\
Content-ID: <logo@x>\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0KGgo=\r\n\
--r\r\n\
Content-Type: image/gif; name=\"spacer.gif\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
R0lGODlh\r\n\
--r\r\n\
Content-Type: text/plain\r\n\
\r\n\
stray text\r\n\
--r--\r\n";

    #[test]
    fn test_first_by_content_type() {
        let msg = parse_message(MSG).unwrap();
        assert_eq!(first_by_content_type(&msg, "text/html").map(|p| p.id), Some(PartId(1)));
        assert_eq!(
            first_by_content_type(&msg, "multipart/related").map(|p| p.id),
            Some(PartId(0))
        );
        assert!(first_by_content_type(&msg, "text/calendar").is_none());
    }

    #[test]
    fn test_first_by_content_id_bare_and_bracketed() {
        let msg = parse_message(MSG).unwrap();
        assert_eq!(first_by_content_id(&msg, "logo@x").map(|p| p.id), Some(PartId(2)));
        assert_eq!(first_by_content_id(&msg, "<logo@x>").map(|p| p.id), Some(PartId(2)));
        assert!(first_by_content_id(&msg, "other@x").is_none());
    }

    #[test]
    fn test_first_by_content_type_name() {
        let msg = parse_message(MSG).unwrap();
        assert_eq!(
            first_by_content_type_name(&msg, "spacer.gif").map(|p| p.id),
            Some(PartId(3))
        );
    }

    #[test]
    fn test_candidates_skip_body_types_and_excluded() {
        let msg = parse_message(MSG).unwrap();
        let all = attachment_candidates(&msg, &PartSet::new());
        assert_eq!(all.into_iter().collect::<Vec<_>>(), [PartId(2), PartId(3)]);

        let exclude: PartSet = [PartId(2)].into_iter().collect();
        let rest = attachment_candidates(&msg, &exclude);
        assert_eq!(rest.into_iter().collect::<Vec<_>>(), [PartId(3)]);
    }

    #[test]
    fn test_filenamed_parts() {
        let msg = parse_message(MSG).unwrap();
        let parts: PartSet = [PartId(1), PartId(2)].into_iter().collect();
        let named = filenamed_parts(&msg, &parts);
        assert_eq!(named.into_iter().collect::<Vec<_>>(), [PartId(2)]);
    }
}
