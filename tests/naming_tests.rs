#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docql::ast::{BinaryOp, Expr, Lambda, Member, Queryable, TypeTag};
    use docql::evaluator::Interpreter;
    use docql::naming::{FieldMeta, MemberNamer, ModelMeta, NamingResolver, Schema, to_wire_json};
    use docql::{NamingPolicy, TranslationOptions, Value};
    use indexmap::IndexMap;

    fn row() -> TypeTag {
        TypeTag::model("Row")
    }

    fn schema() -> Schema {
        Schema::new().model(
            "Row",
            ModelMeta::new()
                .field("Price", FieldMeta::new().wire_name("cost").typed(TypeTag::Int32))
                .field("Title", FieldMeta::new().typed(TypeTag::String)),
        )
    }

    fn document() -> Value {
        let mut fields = IndexMap::new();
        fields.insert("Price".to_string(), Value::Integer(10));
        fields.insert("Title".to_string(), Value::from("Dune"));
        Value::Object(fields)
    }

    /// Filter key of a single-member equality, as the translator spells it
    fn filter_key(member: &str, options: &TranslationOptions) -> String {
        let r = Expr::parameter("r", row());
        let query = Queryable::root(row())
            .where_(Lambda::unary(
                "r",
                row(),
                Expr::compare(
                    BinaryOp::Equal,
                    Expr::member(r, member, TypeTag::Object),
                    Expr::null(TypeTag::Object),
                ),
            ))
            .into_expr();
        let text = docql::translate_query(query, options, &Interpreter::new())
            .unwrap()
            .spec
            .unwrap()
            .query_text;
        let start = text.find("root[\"").unwrap() + "root[\"".len();
        let end = start + text[start..].find('"').unwrap();
        text[start..end].to_string()
    }

    struct Upper;

    impl MemberNamer for Upper {
        fn wire_name(&self, member: &Member) -> String {
            member.name.to_uppercase()
        }
    }

    #[test]
    fn test_filter_keys_match_serialized_document() {
        let options = TranslationOptions::new()
            .naming(NamingPolicy::CamelCase)
            .schema(schema());
        let json = to_wire_json(&document(), &row(), &options.resolver()).unwrap();

        for member in ["Price", "Title"] {
            let key = filter_key(member, &options);
            assert!(json.get(&key).is_some(), "missing key {} in {}", key, json);
        }
        assert_eq!(json, serde_json::json!({ "cost": 10, "title": "Dune" }));
    }

    #[test]
    fn test_default_policy_keeps_declared_names() {
        let options = TranslationOptions::new();
        assert_eq!(filter_key("Title", &options), "Title");

        let json = to_wire_json(&document(), &row(), &options.resolver()).unwrap();
        assert_eq!(json, serde_json::json!({ "Price": 10, "Title": "Dune" }));
    }

    #[test]
    fn test_custom_namer() {
        let policy = NamingPolicy::Custom(Arc::new(Upper));
        let schema = Schema::new();
        let resolver = NamingResolver::new(&policy, &schema);
        assert_eq!(resolver.wire_name(&Member::new(row(), "title")), "TITLE");

        let options = TranslationOptions::new().naming(NamingPolicy::Custom(Arc::new(Upper)));
        assert_eq!(filter_key("title", &options), "TITLE");
    }

    #[test]
    fn test_captured_document_uses_wire_names() {
        let options = TranslationOptions::new()
            .naming(NamingPolicy::CamelCase)
            .schema(schema());
        let r = Expr::parameter("r", row());
        let query = Queryable::root(row())
            .where_(Lambda::unary(
                "r",
                row(),
                Expr::compare(BinaryOp::Equal, r, Expr::constant(document(), row())),
            ))
            .into_expr();
        let text = docql::translate_query(query, &options, &Interpreter::new())
            .unwrap()
            .spec
            .unwrap()
            .query_text;
        assert_eq!(
            text,
            r#"SELECT VALUE root FROM root WHERE (root = {"cost": 10, "title": "Dune"})"#
        );
    }
}
