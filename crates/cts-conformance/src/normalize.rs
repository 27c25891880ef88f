use cts_protocol::{Reply, cmp_replies};

/// Canonical form used on both sides of every comparison.
///
/// Text becomes bytes, booleans become `b"True"`/`b"False"`, aggregates are
/// normalized element-wise. Map entries are also ordered by key so that two maps
/// holding the same pairs compare equal regardless of wire order.
#[must_use]
pub fn normalize(reply: Reply) -> Reply {
    match reply {
        Reply::Text(text) => Reply::Bytes(text.into_bytes()),
        Reply::Bool(true) => Reply::Bytes(b"True".to_vec()),
        Reply::Bool(false) => Reply::Bytes(b"False".to_vec()),
        Reply::Seq(items) => Reply::Seq(items.into_iter().map(normalize).collect()),
        Reply::Map(entries) => {
            let mut entries: Vec<(Reply, Reply)> = entries
                .into_iter()
                .map(|(key, value)| (normalize(key), normalize(value)))
                .collect();
            entries.sort_by(|(left, _), (right, _)| cmp_replies(left, right));
            Reply::Map(entries)
        }
        passthrough @ (Reply::Nil | Reply::Int(_) | Reply::Double(_) | Reply::Bytes(_)) => {
            passthrough
        }
    }
}
