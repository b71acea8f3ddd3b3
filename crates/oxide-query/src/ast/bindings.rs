//! Binding bookkeeping per clause category.

use std::collections::BTreeMap;

use crate::value::SqlValue;

/// Clause category a binding belongs to.
///
/// The declaration order is the order in which the grammar emits
/// placeholders for a select statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingCategory {
    /// Raw and sub-select columns.
    Select,
    /// Raw or sub-select `from`.
    From,
    /// Join conditions and joined sub-selects.
    Join,
    /// Where clauses.
    Where,
    /// Raw group-by fragments.
    GroupBy,
    /// Having clauses.
    Having,
    /// Raw and sub-select orders.
    Order,
    /// Union branches.
    Union,
    /// Orders applied to the whole union.
    UnionOrder,
}

/// Bound values keyed by clause category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<BindingCategory, Vec<SqlValue>>,
}

impl Bindings {
    /// Creates an empty binding map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value to a category.
    pub fn push(&mut self, category: BindingCategory, value: SqlValue) {
        self.values.entry(category).or_default().push(value);
    }

    /// Appends several values to a category.
    pub fn extend(&mut self, category: BindingCategory, values: impl IntoIterator<Item = SqlValue>) {
        self.values.entry(category).or_default().extend(values);
    }

    /// Values recorded for a category.
    #[must_use]
    pub fn get(&self, category: BindingCategory) -> &[SqlValue] {
        self.values.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Removes every value of a category.
    pub fn clear(&mut self, category: BindingCategory) {
        self.values.remove(&category);
    }

    /// All values in category order.
    #[must_use]
    pub fn flatten(&self) -> Vec<SqlValue> {
        self.values.values().flatten().cloned().collect()
    }

    /// Total number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.values().map(Vec::len).sum()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_follows_category_order() {
        let mut bindings = Bindings::new();
        bindings.push(BindingCategory::Where, SqlValue::Int(2));
        bindings.push(BindingCategory::Union, SqlValue::Int(4));
        bindings.push(BindingCategory::Select, SqlValue::Int(1));
        bindings.push(BindingCategory::Where, SqlValue::Int(3));

        assert_eq!(
            bindings.flatten(),
            vec![
                SqlValue::Int(1),
                SqlValue::Int(2),
                SqlValue::Int(3),
                SqlValue::Int(4)
            ]
        );
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn test_clear_category() {
        let mut bindings = Bindings::new();
        bindings.push(BindingCategory::Select, SqlValue::Int(1));
        bindings.push(BindingCategory::Where, SqlValue::Int(2));
        bindings.clear(BindingCategory::Select);
        assert_eq!(bindings.get(BindingCategory::Select), &[] as &[SqlValue]);
        assert_eq!(bindings.flatten(), vec![SqlValue::Int(2)]);
    }
}
