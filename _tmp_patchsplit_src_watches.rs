// C4: Watch Registry. Insertion-ordered, de-duplicated by expression text.
// Deliberately dumb: it stores the expression string only, evaluation is
// the inspector's job each time the list is displayed.

#[derive(Default)]
pub struct WatchRegistry {
    entries: Vec<String>,
}

impl WatchRegistry {
    pub fn new() -> WatchRegistry {
        WatchRegistry::default()
    }

    // Returns false if `expr` is already being watched.
    pub fn add(&mut self, expr: &str) -> bool {
        if self.entries.iter().any(|e| e == expr) {
            return false;
        }
        self.entries.push(expr.to_string());
        true
    }

    pub fn clear_by_name(&mut self, expr: &str) -> bool {
        if let Some(idx) = self.entries.iter().position(|e| e == expr) {
            self.entries.remove(idx);
            true
        } else {
            false
        }
    }

    // `index` is the 1-based position shown by `list`.
    pub fn clear_by_index(&mut self, index: usize) -> bool {
        if index == 0 || index > self.entries.len() {
            return false;
        }
        self.entries.remove(index - 1);
        true
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn list(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().enumerate().map(|(i, e)| (i + 1, e.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_by_expression() {
        let mut w = WatchRegistry::new();
        assert!(w.add("x"));
        assert!(!w.add("x"));
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn clear_by_one_based_index() {
        let mut w = WatchRegistry::new();
        w.add("x");
        w.add("y");
        assert!(w.clear_by_index(1));
        let remaining: Vec<_> = w.list().map(|(_, e)| e.to_string()).collect();
        assert_eq!(remaining, vec!["y".to_string()]);
    }

    #[test]
    fn clear_by_index_out_of_range() {
        let mut w = WatchRegistry::new();
        w.add("x");
        assert!(!w.clear_by_index(0));
        assert!(!w.clear_by_index(2));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut w = WatchRegistry::new();
        w.add("b");
        w.add("a");
        let names: Vec<_> = w.list().map(|(_, e)| e.to_string()).collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }
}

