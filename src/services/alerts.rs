use crate::domain::models::{AlertDraft, Severity};

const ALERT_KEYWORDS: [&str; 10] = [
    "harassment",
    "discrimination",
    "unsafe",
    "bullying",
    "threat",
    "inappropriate",
    "unfair treatment",
    "racism",
    "sexism",
    "abuse",
];

const HIGH_SEVERITY_KEYWORDS: [&str; 3] = ["threat", "abuse", "harassment"];

pub fn severity_for(keyword: &str) -> Severity {
    if HIGH_SEVERITY_KEYWORDS.contains(&keyword) {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Flags every lexicon keyword that appears as a substring of the text.
///
/// Matching is plain substring containment on the lowercased text, so
/// "abuser" also raises `abuse`. One entry per distinct keyword, in lexicon
/// order.
pub fn scan(text: &str) -> Vec<AlertDraft> {
    let lowered = text.to_lowercase();

    ALERT_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .map(|keyword| AlertDraft {
            alert_type: keyword.to_string(),
            severity: severity_for(keyword),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_raises_nothing() {
        assert!(scan("").is_empty());
        assert!(scan("The seminar room is cold").is_empty());
    }

    #[test]
    fn threat_is_high_bullying_is_medium() {
        let alerts = scan("Another student made a THREAT after class");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "threat");
        assert_eq!(alerts[0].severity, Severity::High);

        let alerts = scan("There is bullying in the group chat");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Medium);
    }

    #[test]
    fn each_keyword_raises_its_own_alert() {
        let alerts = scan("Verbal abuse happens in the unsafe lab");
        assert_eq!(alerts.len(), 2);

        let unsafe_alert = alerts.iter().find(|a| a.alert_type == "unsafe").unwrap();
        let abuse_alert = alerts.iter().find(|a| a.alert_type == "abuse").unwrap();
        assert_eq!(unsafe_alert.severity, Severity::Medium);
        assert_eq!(abuse_alert.severity, Severity::High);
    }

    #[test]
    fn matches_inside_longer_words() {
        let alerts = scan("The abuser was never reported");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "abuse");
    }

    #[test]
    fn multi_word_keyword() {
        let alerts = scan("I received unfair treatment during grading");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "unfair treatment");
        assert_eq!(alerts[0].severity, Severity::Medium);
    }

    #[test]
    fn never_produces_low_severity() {
        let text = ALERT_KEYWORDS.join(" ");
        let alerts = scan(&text);
        assert_eq!(alerts.len(), ALERT_KEYWORDS.len());
        assert!(alerts.iter().all(|a| a.severity != Severity::Low));
        assert_eq!(
            alerts.iter().filter(|a| a.severity == Severity::High).count(),
            3
        );
    }
}
