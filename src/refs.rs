//! Reference path strings.
//!
//! Every stored record is addressable through its ownership chain
//! (`users/{uid}/gfffts/{gid}/boards/{bid}/...`). These path strings are the
//! stable external reference format: they are persisted in sibling rows
//! (a thread's first/latest post, a bookmark's target) and parsed back
//! during hydration.

pub fn user_ref(uid: &str) -> String {
    format!("users/{}", uid)
}

pub fn gffft_ref(uid: &str, gid: i64) -> String {
    format!("users/{}/gfffts/{}", uid, gid)
}

pub fn feature_ref(uid: &str, gid: i64, feature: &str, fid: i64) -> String {
    format!("users/{}/gfffts/{}/{}/{}", uid, gid, feature, fid)
}

pub fn thread_ref(uid: &str, gid: i64, bid: i64, tid: i64) -> String {
    format!("users/{}/gfffts/{}/boards/{}/threads/{}", uid, gid, bid, tid)
}

pub fn post_ref(uid: &str, gid: i64, bid: i64, tid: i64, pid: i64) -> String {
    format!(
        "users/{}/gfffts/{}/boards/{}/threads/{}/posts/{}",
        uid, gid, bid, tid, pid
    )
}

/// A parsed post reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostRef {
    pub uid: String,
    pub gid: i64,
    pub board_id: i64,
    pub thread_id: i64,
    pub post_id: i64,
}

/// Parses a stored post reference back into its components.
/// Returns None for anything that is not a full post path.
pub fn parse_post_ref(raw: &str) -> Option<PostRef> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 10 {
        return None;
    }
    if parts[0] != "users"
        || parts[2] != "gfffts"
        || parts[4] != "boards"
        || parts[6] != "threads"
        || parts[8] != "posts"
    {
        return None;
    }
    Some(PostRef {
        uid: parts[1].to_owned(),
        gid: parts[3].parse().ok()?,
        board_id: parts[5].parse().ok()?,
        thread_id: parts[7].parse().ok()?,
        post_id: parts[9].parse().ok()?,
    })
}

/// Parses a gffft reference into (owner uid, gffft id).
pub fn parse_gffft_ref(raw: &str) -> Option<(String, i64)> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 4 || parts[0] != "users" || parts[2] != "gfffts" {
        return None;
    }
    Some((parts[1].to_owned(), parts[3].parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_ref_round_trip() {
        let raw = post_ref("u1aB", 44, 2, 17, 901);
        assert_eq!(raw, "users/u1aB/gfffts/44/boards/2/threads/17/posts/901");
        let parsed = parse_post_ref(&raw).expect("should parse");
        assert_eq!(parsed.uid, "u1aB");
        assert_eq!(parsed.gid, 44);
        assert_eq!(parsed.board_id, 2);
        assert_eq!(parsed.thread_id, 17);
        assert_eq!(parsed.post_id, 901);
    }

    #[test]
    fn test_gffft_ref_round_trip() {
        let raw = gffft_ref("abc", 9);
        assert_eq!(parse_gffft_ref(&raw), Some(("abc".to_owned(), 9)));
    }

    #[test]
    fn test_parse_rejects_foreign_paths() {
        assert!(parse_post_ref("users/u/gfffts/1").is_none());
        assert!(parse_post_ref("users/u/gfffts/x/boards/1/threads/2/posts/3").is_none());
        assert!(parse_post_ref("teams/u/gfffts/1/boards/1/threads/2/posts/3").is_none());
        assert!(parse_gffft_ref("users/u/boards/1").is_none());
    }
}
