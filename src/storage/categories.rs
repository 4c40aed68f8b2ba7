//! Category and group queries

use crate::error::EnvelopeError;
use crate::models::{BudgetId, Category, CategoryGroup, CategoryGroupId};

use super::collection::Collection;

impl Collection<CategoryGroup> {
    /// A budget's groups in display order
    pub fn ordered(&self, budget_id: BudgetId) -> Result<Vec<CategoryGroup>, EnvelopeError> {
        let mut groups = self.filter(|g| g.budget_id == budget_id)?;
        groups.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(groups)
    }

    /// The budget's system income group
    pub fn system_group(&self, budget_id: BudgetId) -> Result<Option<CategoryGroup>, EnvelopeError> {
        self.find(|g| g.budget_id == budget_id && g.system)
    }

    /// Sort order for a group appended at the end
    pub fn next_sort_order(&self, budget_id: BudgetId) -> Result<i32, EnvelopeError> {
        Ok(self
            .filter(|g| g.budget_id == budget_id)?
            .iter()
            .map(|g| g.sort_order + 1)
            .max()
            .unwrap_or(0))
    }
}

impl Collection<Category> {
    /// Categories in a group in display order
    pub fn get_categories_in_group(&self, group_id: CategoryGroupId) -> Result<Vec<Category>, EnvelopeError> {
        let mut categories = self.filter(|c| c.group_id == group_id)?;
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(categories)
    }

    /// Sort order for a category appended to a group
    pub fn next_sort_order(&self, group_id: CategoryGroupId) -> Result<i32, EnvelopeError> {
        Ok(self
            .filter(|c| c.group_id == group_id)?
            .iter()
            .map(|c| c.sort_order + 1)
            .max()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DefaultCategoryGroup;
    use tempfile::TempDir;

    #[test]
    fn test_group_order_and_names() {
        let temp_dir = TempDir::new().unwrap();
        let groups: Collection<CategoryGroup> = Collection::new(temp_dir.path().join("groups.json"));
        let categories: Collection<Category> = Collection::new(temp_dir.path().join("categories.json"));
        let budget = BudgetId::new();

        for (i, default) in DefaultCategoryGroup::all().iter().enumerate().rev() {
            let (group, cats) = default.build(budget, i as i32);
            groups.upsert(group).unwrap();
            categories.upsert_many(cats).unwrap();
        }

        let ordered = groups.ordered(budget).unwrap();
        assert_eq!(ordered[0].name, "Income");
        assert!(groups.system_group(budget).unwrap().unwrap().system);
        assert_eq!(groups.next_sort_order(budget).unwrap(), ordered.len() as i32);

        let bills = groups.find_by_name(budget, "bills").unwrap().unwrap();
        let in_bills = categories.get_categories_in_group(bills.id).unwrap();
        assert!(!in_bills.is_empty());
        assert_eq!(
            categories.next_sort_order(bills.id).unwrap(),
            in_bills.len() as i32
        );

        let dup = Category::new(budget, bills.id, in_bills[0].name.to_uppercase(), 9);
        assert!(categories.insert_named(dup).unwrap().is_err());

        // Names only collide within the same budget
        let elsewhere = Category::new(BudgetId::new(), bills.id, in_bills[0].name.clone(), 9);
        assert!(categories.insert_named(elsewhere).unwrap().is_ok());
    }
}
