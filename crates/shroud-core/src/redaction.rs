use std::fmt;

use crate::flags::Flag;
use crate::mirror::MirrorSnapshot;

/// Marker class that hides message text
pub const CONTENT_HIDDEN_CLASS: &str = "content-hidden";

/// Marker class that hides the sender name
pub const SENDER_HIDDEN_CLASS: &str = "sender-hidden";

/// Element inside the notification window the markers go on
pub const TARGET_SELECTOR: &str = ".zadark";

/// (marker class, flag that requires it)
const MARKERS: [(&str, Flag); 2] = [
    (CONTENT_HIDDEN_CLASS, Flag::HideContent),
    (SENDER_HIDDEN_CLASS, Flag::HideSender),
];

/// Ordered, duplicate-free set of CSS classes on a display element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassList {
    classes: Vec<String>,
}

impl ClassList {
    /// Parse a `className`-style whitespace separated string
    #[must_use]
    pub fn parse(class_name: &str) -> Self {
        let mut list = Self::default();
        for class in class_name.split_whitespace() {
            list.add(class);
        }
        list
    }

    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Returns whether the class was newly added
    pub fn add(&mut self, class: &str) -> bool {
        if self.contains(class) {
            return false;
        }
        self.classes.push(class.to_string());
        true
    }

    /// Returns whether the class was present
    pub fn remove(&mut self, class: &str) -> bool {
        let before = self.classes.len();
        self.classes.retain(|c| c != class);
        self.classes.len() != before
    }

    /// Force presence or absence; returns whether the list changed
    pub fn toggle(&mut self, class: &str, present: bool) -> bool {
        if present {
            self.add(class)
        } else {
            self.remove(class)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Display for ClassList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.classes.join(" "))
    }
}

/// Marker classes the snapshot calls for
#[must_use]
pub fn marker_classes(snapshot: &MirrorSnapshot) -> Vec<&'static str> {
    MARKERS
        .iter()
        .filter(|(_, flag)| snapshot.get(*flag))
        .map(|(class, _)| *class)
        .collect()
}

/// Bring the marker classes in line with the snapshot, leaving every other class alone.
///
/// Idempotent. Returns whether anything changed.
pub fn apply(classes: &mut ClassList, snapshot: &MirrorSnapshot) -> bool {
    let mut changed = false;
    for (class, flag) in MARKERS {
        changed |= classes.toggle(class, snapshot.get(flag));
    }
    changed
}

/// Script the host runs inside the notification window.
///
/// Does nothing when the target element is missing; otherwise evaluates to the
/// element's resulting `className`.
#[must_use]
pub fn script(snapshot: &MirrorSnapshot) -> String {
    let toggles: String = MARKERS
        .iter()
        .map(|(class, flag)| format!("  el.classList.toggle('{class}', {});\n", snapshot.get(*flag)))
        .collect();

    format!(
        "(function () {{\n  var el = document.querySelector('{TARGET_SELECTOR}');\n  if (!el) {{ return null; }}\n{toggles}  return el.className;\n}})();\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(content: bool, sender: bool) -> MirrorSnapshot {
        MirrorSnapshot::default()
            .with(Flag::HideContent, content)
            .with(Flag::HideSender, sender)
    }

    #[test]
    fn test_class_list_parse_dedupes() {
        let list = ClassList::parse("  zadark  theme  zadark ");
        assert_eq!(list.len(), 2);
        assert_eq!(list.to_string(), "zadark theme");
    }

    #[test]
    fn test_content_only_scenario() {
        let mut classes = ClassList::parse("zadark");
        assert!(apply(&mut classes, &snapshot(true, false)));

        assert!(classes.contains(CONTENT_HIDDEN_CLASS));
        assert!(!classes.contains(SENDER_HIDDEN_CLASS));
        assert!(classes.contains("zadark"));
    }

    #[test]
    fn test_apply_removes_stale_markers() {
        let mut classes = ClassList::parse("zadark content-hidden sender-hidden");
        assert!(apply(&mut classes, &snapshot(false, true)));
        assert_eq!(classes.to_string(), "zadark sender-hidden");
    }

    #[test]
    fn test_apply_with_no_flags_on_clean_element() {
        let mut classes = ClassList::parse("zadark");
        assert!(!apply(&mut classes, &MirrorSnapshot::default()));
        assert_eq!(classes.to_string(), "zadark");
    }

    #[test]
    fn test_block_flags_do_not_affect_markers() {
        let snapshot = MirrorSnapshot::default()
            .with(Flag::BlockTyping, true)
            .with(Flag::BlockSeen, true);
        assert!(marker_classes(&snapshot).is_empty());
    }

    #[test]
    fn test_marker_classes() {
        assert_eq!(
            marker_classes(&snapshot(true, true)),
            vec![CONTENT_HIDDEN_CLASS, SENDER_HIDDEN_CLASS]
        );
        assert_eq!(marker_classes(&snapshot(false, true)), vec![SENDER_HIDDEN_CLASS]);
    }

    #[test]
    fn test_script_contents() {
        let script = script(&snapshot(true, false));
        assert!(script.contains("document.querySelector('.zadark')"));
        assert!(script.contains("if (!el) { return null; }"));
        assert!(script.contains("el.classList.toggle('content-hidden', true);"));
        assert!(script.contains("el.classList.toggle('sender-hidden', false);"));
        assert!(script.trim_end().ends_with("})();"));
    }

    proptest! {
        #[test]
        fn apply_is_idempotent(
            content in any::<bool>(),
            sender in any::<bool>(),
            existing in proptest::collection::vec(
                prop_oneof![
                    Just("zadark"),
                    Just("content-hidden"),
                    Just("sender-hidden"),
                    Just("theme-dark"),
                ],
                0..6,
            ),
        ) {
            let snapshot = snapshot(content, sender);
            let mut once = ClassList::parse(&existing.join(" "));
            apply(&mut once, &snapshot);

            let mut twice = once.clone();
            prop_assert!(!apply(&mut twice, &snapshot));
            prop_assert_eq!(&once, &twice);

            prop_assert_eq!(once.contains(CONTENT_HIDDEN_CLASS), content);
            prop_assert_eq!(once.contains(SENDER_HIDDEN_CLASS), sender);
            prop_assert_eq!(once.contains("theme-dark"), existing.contains(&"theme-dark"));
        }
    }
}
