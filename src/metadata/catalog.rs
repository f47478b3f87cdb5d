//! Shared structural catalog (`form_structure.yaml`).
//!
//! Describes storage shape only: which table backs each form, which fields
//! and columns it has, and which grids link a form to its child forms.

use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub forms: IndexMap<String, FormDecl>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormDecl {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub fields: Vec<CatalogField>,
    /// Nested field groups, flattened after `fields`
    #[serde(default)]
    pub sections: Vec<FieldGroup>,
    #[serde(default)]
    pub grids: Vec<GridDecl>,
    /// Column in this form's table holding its parent's key
    #[serde(default)]
    pub parent_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<CatalogField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogField {
    pub id: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub lookup_form: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridDecl {
    pub id: String,
    pub sub_form: String,
    /// Field id (in the sub-form) holding the parent's key
    #[serde(default)]
    pub foreign_key: Option<String>,
}

impl FormDecl {
    /// Top-level fields followed by every grouped field, in declaration order.
    pub fn all_fields(&self) -> impl Iterator<Item = &CatalogField> {
        self.fields
            .iter()
            .chain(self.sections.iter().flat_map(|group| group.fields.iter()))
    }

    pub fn field(&self, id: &str) -> Option<&CatalogField> {
        self.all_fields().find(|f| f.id == id)
    }
}

impl CatalogDocument {
    pub fn form(&self, name: &str) -> Option<&FormDecl> {
        self.forms.get(name)
    }

    /// Names of every form flagged as the record-graph root.
    pub fn root_forms(&self) -> Vec<&str> {
        self.forms
            .iter()
            .filter(|(_, form)| form.root)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Find a grid by id across all forms, with the name of its owning form.
    pub fn grid(&self, grid_id: &str) -> Option<(&str, &GridDecl)> {
        self.forms.iter().find_map(|(name, form)| {
            form.grids
                .iter()
                .find(|g| g.id == grid_id)
                .map(|g| (name.as_str(), g))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
forms:
  registration:
    table: farms
    root: true
    fields:
      - { id: national_id, column: c_national_id, type: textfield, required: true }
    grids:
      - { id: members, sub_form: member_form, foreign_key: farmer_id }
  member_form:
    table: household_members
    sections:
      - name: Person
        fields:
          - { id: member_name, column: c_member_name }
          - { id: farmer_id, column: c_farmer_ref }
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog: CatalogDocument = serde_yaml::from_str(CATALOG).unwrap();
        assert_eq!(catalog.forms.len(), 2);
        assert_eq!(catalog.root_forms(), vec!["registration"]);

        let reg = catalog.form("registration").unwrap();
        let field = reg.field("national_id").unwrap();
        assert_eq!(field.column.as_deref(), Some("c_national_id"));
        assert_eq!(field.field_type.as_deref(), Some("textfield"));
        assert_eq!(field.required, Some(true));
    }

    #[test]
    fn test_grouped_fields_are_flattened() {
        let catalog: CatalogDocument = serde_yaml::from_str(CATALOG).unwrap();
        let member = catalog.form("member_form").unwrap();
        let ids: Vec<_> = member.all_fields().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["member_name", "farmer_id"]);
    }

    #[test]
    fn test_grid_lookup() {
        let catalog: CatalogDocument = serde_yaml::from_str(CATALOG).unwrap();
        let (owner, grid) = catalog.grid("members").unwrap();
        assert_eq!(owner, "registration");
        assert_eq!(grid.sub_form, "member_form");
        assert!(catalog.grid("missing").is_none());
    }
}
