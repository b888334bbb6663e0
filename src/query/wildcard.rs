//! `*`-delimited wildcard queries.

/// Split `A*B*C` into its keys. Empty pieces (`**`, leading or trailing
/// `*`) are dropped.
pub fn split_query(query: &str) -> Vec<String> {
    query
        .split('*')
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every way of placing `*` between adjacent characters of `s`, starting
/// with `s` itself.
///
/// A string of n characters has 2^(n-1) variations, so keep it short.
pub fn variations(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let Some((&first, rest)) = chars.split_first() else {
        return Vec::new();
    };

    let mut out = vec![first.to_string()];
    for &c in rest {
        let mut next = Vec::with_capacity(out.len() * 2);
        for prefix in &out {
            let mut joined = prefix.clone();
            joined.push(c);
            next.push(joined);

            let mut gapped = prefix.clone();
            gapped.push('*');
            gapped.push(c);
            next.push(gapped);
        }
        out = next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("駅*どこ*か"), vec!["駅", "どこ", "か"]);
        assert_eq!(split_query("*駅**か*"), vec!["駅", "か"]);
        assert!(split_query("***").is_empty());
        assert!(split_query("").is_empty());
    }

    #[test]
    fn test_variations() {
        assert_eq!(variations("あいう"), vec!["あいう", "あい*う", "あ*いう", "あ*い*う"]);
        assert_eq!(variations("あ"), vec!["あ"]);
        assert!(variations("").is_empty());
    }

    #[test]
    fn test_variations_split_back() {
        for v in variations("はなが") {
            assert_eq!(split_query(&v).concat(), "はなが");
        }
    }
}
