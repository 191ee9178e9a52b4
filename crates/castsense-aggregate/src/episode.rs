use once_cell::sync::Lazy;
use regex::Regex;

static EPISODE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"Episode (\d+)").unwrap());

/// Episode number from a discussion thread title: the integer literally
/// following the first "Episode " (case-sensitive).
pub fn extract_episode_number(title: &str) -> Option<u32> {
    EPISODE_NUMBER
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_number() {
        assert_eq!(
            extract_episode_number("Love Island Season 7 Episode 12 Post Episode Discussion"),
            Some(12)
        );
        assert_eq!(extract_episode_number("Episode 3 and Episode 4"), Some(3));
    }

    #[test]
    fn test_missing_or_wrong_case() {
        assert_eq!(extract_episode_number("Love Island Season 7 Reunion Discussion"), None);
        assert_eq!(extract_episode_number("season 7 episode 12"), None);
        assert_eq!(extract_episode_number("Post Episode Discussion"), None);
    }
}
