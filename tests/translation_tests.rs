#[cfg(test)]
mod tests {
    use docql::ast::{
        BinaryOp, DeclaringType, Expr, Lambda, Member, MemberBinding, MethodRef, ParameterDecl,
        Queryable, TypeTag,
    };
    use docql::evaluator::Interpreter;
    use docql::naming::{Converter, FieldMeta, ModelMeta, Schema};
    use docql::sql::{SqlCollection, SqlScalar};
    use docql::{NamingPolicy, ScalarOperationKind, TranslatedQuery, TranslationError, TranslationOptions, Value};
    use indexmap::IndexMap;

    // Helper functions to build query expressions for testing
    fn row() -> TypeTag {
        TypeTag::model("Row")
    }

    fn r() -> Expr {
        Expr::parameter("r", row())
    }

    fn price() -> Expr {
        Expr::member(r(), "price", TypeTag::Int32)
    }

    fn title() -> Expr {
        Expr::member(r(), "title", TypeTag::String)
    }

    fn tags() -> Expr {
        Expr::member(r(), "tags", TypeTag::array(TypeTag::String))
    }

    fn child() -> Expr {
        Expr::member(r(), "child", TypeTag::model("Child"))
    }

    fn tag_is(value: &str) -> Lambda {
        let t = Expr::parameter("t", TypeTag::String);
        Lambda::unary("t", TypeTag::String, Expr::compare(BinaryOp::Equal, t, Expr::string(value)))
    }

    /// `Enumerable.<method>(r.tags, extra...)` inside a lambda body
    fn over_tags(method: &str, extra: Vec<Expr>, ty: TypeTag) -> Expr {
        let mut args = vec![tags()];
        args.extend(extra);
        Expr::static_call(MethodRef::enumerable(method), args, ty)
    }

    fn lambda(body: Expr) -> Lambda {
        Lambda::unary("r", row(), body)
    }

    fn rows() -> Queryable {
        Queryable::root(row())
    }

    fn price_over(n: i64) -> Lambda {
        lambda(Expr::compare(BinaryOp::GreaterThan, price(), Expr::int(n)))
    }

    fn translate_with(expr: Expr, options: &TranslationOptions) -> docql::Result<TranslatedQuery> {
        docql::translate_query(expr, options, &Interpreter::new())
    }

    fn translate(expr: Expr) -> docql::Result<TranslatedQuery> {
        translate_with(expr, &TranslationOptions::new())
    }

    fn sql(expr: Expr) -> String {
        translate(expr).unwrap().spec.unwrap().query_text
    }

    fn sql_with(expr: Expr, options: &TranslationOptions) -> String {
        translate_with(expr, options).unwrap().spec.unwrap().query_text
    }

    fn unsupported_message(result: docql::Result<TranslatedQuery>) -> String {
        match result {
            Err(TranslationError::UnsupportedExpressionShape(message)) => message,
            other => panic!("expected an unsupported shape error, got {:?}", other),
        }
    }

    // ========================================================================
    // Basic operator chains
    // ========================================================================

    #[test]
    fn test_where() {
        let query = rows().where_(price_over(100)).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE root FROM root WHERE (root["price"] > 100)"#);
    }

    #[test]
    fn test_where_then_select() {
        let query = rows()
            .where_(price_over(100))
            .select(lambda(title()))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root["title"] FROM root WHERE (root["price"] > 100)"#
        );
    }

    #[test]
    fn test_select_then_take() {
        let query = rows().select(lambda(title())).take(5).into_expr();
        assert_eq!(sql(query), r#"SELECT TOP 5 VALUE root["title"] FROM root"#);
    }

    #[test]
    fn test_select_then_where_flattens() {
        let t = Expr::parameter("t", TypeTag::String);
        let query = rows()
            .select(lambda(title()))
            .where_(Lambda::unary(
                "t",
                TypeTag::String,
                Expr::compare(BinaryOp::GreaterThan, t, Expr::string("A")),
            ))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root["title"] FROM root WHERE (root["title"] > "A")"#
        );
    }

    #[test]
    fn test_flattening_is_deterministic() {
        let build = || {
            rows()
                .select(lambda(title()))
                .where_(Lambda::unary(
                    "t",
                    TypeTag::String,
                    Expr::compare(
                        BinaryOp::NotEqual,
                        Expr::parameter("t", TypeTag::String),
                        Expr::string(""),
                    ),
                ))
                .into_expr()
        };
        assert_eq!(sql(build()), sql(build()));
    }

    #[test]
    fn test_successive_wheres_are_anded() {
        let query = rows()
            .where_(price_over(1))
            .where_(lambda(Expr::compare(
                BinaryOp::LessThan,
                price(),
                Expr::int(9),
            )))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root FROM root WHERE ((root["price"] > 1) AND (root["price"] < 9))"#
        );
    }

    #[test]
    fn test_order_by_then_by() {
        let query = rows()
            .order_by_descending(lambda(price()))
            .then_by(lambda(title()))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root FROM root ORDER BY root["price"] DESC, root["title"] ASC"#
        );
    }

    #[test]
    fn test_order_by_then_by_descending() {
        let query = rows()
            .order_by(lambda(title()))
            .then_by_descending(lambda(price()))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root FROM root ORDER BY root["title"] ASC, root["price"] DESC"#
        );
    }

    #[test]
    fn test_conditional_projection() {
        let label = Expr::conditional(
            Expr::compare(BinaryOp::GreaterThan, price(), Expr::int(10)),
            Expr::string("high"),
            Expr::string("low"),
        );
        let query = rows().select(lambda(label)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE ((root["price"] > 10) ? "high" : "low") FROM root"#
        );
    }

    #[test]
    fn test_distinct_projection() {
        let query = rows().select(lambda(title())).distinct().into_expr();
        assert_eq!(sql(query), r#"SELECT DISTINCT VALUE root["title"] FROM root"#);
    }

    #[test]
    fn test_anonymous_projection() {
        let query = rows()
            .select(lambda(Expr::new_anonymous(vec![
                ("name", title()),
                ("cost", price()),
            ])))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE {"name": root["title"], "cost": root["price"]} FROM root"#
        );
    }

    #[test]
    fn test_query_root_without_operators() {
        let translated = translate(rows().into_expr()).unwrap();
        assert_eq!(translated.spec, None);
        assert_eq!(translated.scalar_operation, ScalarOperationKind::None);
    }

    // ========================================================================
    // Row limits
    // ========================================================================

    #[test]
    fn test_take_merges_by_minimum() {
        let query = rows().take(10).take(3).take(7).into_expr();
        assert_eq!(sql(query), "SELECT TOP 3 VALUE root FROM root");
    }

    #[test]
    fn test_skip_then_take() {
        let query = rows().skip(10).take(5).into_expr();
        assert_eq!(sql(query), "SELECT VALUE root FROM root OFFSET 10 LIMIT 5");
    }

    #[test]
    fn test_skips_add_up() {
        let query = rows().skip(2).skip(3).into_expr();
        assert_eq!(sql(query), "SELECT VALUE root FROM root OFFSET 5 LIMIT 2147483647");
    }

    #[test]
    fn test_where_after_take_fails() {
        let query = rows().take(5).where_(price_over(1)).into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "LINQ operations after a Take() is not supported"
        );
    }

    #[test]
    fn test_order_by_after_skip_fails() {
        let query = rows().skip(5).order_by(lambda(price())).into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "LINQ operations after a Skip() is not supported"
        );
    }

    #[test]
    fn test_negative_take_fails() {
        let query = rows().take(-1).into_expr();
        assert!(matches!(
            translate(query),
            Err(TranslationError::UnsupportedExpressionShape(_))
        ));
    }

    #[test]
    fn test_parameterized_take() {
        let options = TranslationOptions::new().parameter("@n", 10i64);
        let query = rows().take(10).into_expr();
        let spec = translate_with(query, &options).unwrap().spec.unwrap();
        assert_eq!(spec.query_text, "SELECT TOP @n VALUE root FROM root");
        assert_eq!(spec.parameters.len(), 1);
        assert_eq!(spec.parameters[0].name, "@n");
        assert_eq!(spec.parameters[0].value, serde_json::json!(10));
    }

    // ========================================================================
    // Scalar results
    // ========================================================================

    #[test]
    fn test_count() {
        let translated = translate(rows().count()).unwrap();
        assert_eq!(
            translated.spec.unwrap().query_text,
            "SELECT VALUE COUNT(1) FROM root"
        );
        assert_eq!(translated.scalar_operation, ScalarOperationKind::FirstOrDefault);
    }

    #[test]
    fn test_count_with_predicate() {
        assert_eq!(
            sql(rows().count_where(price_over(3))),
            r#"SELECT VALUE COUNT(1) FROM root WHERE (root["price"] > 3)"#
        );
    }

    #[test]
    fn test_count_after_projection() {
        assert_eq!(
            sql(rows().select(lambda(title())).count()),
            "SELECT VALUE COUNT(1) FROM root"
        );
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(
            sql(rows().sum(lambda(price()))),
            r#"SELECT VALUE SUM(root["price"]) FROM root"#
        );
        assert_eq!(
            sql(rows().where_(price_over(0)).max(lambda(price()))),
            r#"SELECT VALUE MAX(root["price"]) FROM root WHERE (root["price"] > 0)"#
        );
        assert_eq!(
            sql(rows().select(lambda(price())).aggregate("Min")),
            r#"SELECT VALUE MIN(root["price"]) FROM root"#
        );
    }

    #[test]
    fn test_average() {
        assert_eq!(
            sql(rows().average(lambda(price()))),
            r#"SELECT VALUE AVG(root["price"]) FROM root"#
        );
    }

    #[test]
    fn test_any() {
        let translated = translate(rows().any_where(price_over(5))).unwrap();
        assert_eq!(
            translated.spec.unwrap().query_text,
            r#"SELECT VALUE (COUNT(1) > 0) FROM root WHERE (root["price"] > 5)"#
        );
        assert_eq!(translated.scalar_operation, ScalarOperationKind::FirstOrDefault);
    }

    #[test]
    fn test_first_or_default() {
        let translated = translate(rows().where_(price_over(1)).first_or_default()).unwrap();
        assert_eq!(
            translated.spec.unwrap().query_text,
            r#"SELECT TOP 1 VALUE root FROM root WHERE (root["price"] > 1)"#
        );
        assert_eq!(translated.scalar_operation, ScalarOperationKind::FirstOrDefault);
    }

    #[test]
    fn test_count_must_be_outermost() {
        let nested = Queryable::from_expr(rows().count())
            .where_(price_over(1))
            .into_expr();
        assert!(unsupported_message(translate(nested)).contains("last operation"));
    }

    #[test]
    fn test_aggregate_over_distinct_reads_subquery() {
        let query = rows().select(lambda(price())).distinct().sum(Lambda::unary(
            "p",
            TypeTag::Int32,
            Expr::parameter("p", TypeTag::Int32),
        ));
        let translated = translate(query).unwrap();
        assert_eq!(
            translated.spec.unwrap().query_text,
            r#"SELECT VALUE SUM(r1) FROM (SELECT DISTINCT VALUE root["price"] FROM root) AS r1"#
        );
        assert_eq!(translated.scalar_operation, ScalarOperationKind::FirstOrDefault);
    }

    #[test]
    fn test_count_over_distinct_reads_subquery() {
        let query = rows().select(lambda(title())).distinct().count();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE COUNT(1) FROM (SELECT DISTINCT VALUE root["title"] FROM root) AS r1"#
        );
    }

    #[test]
    fn test_projection_over_distinct_reads_subquery() {
        let query = rows().distinct().select(lambda(title())).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE r0["title"] FROM (SELECT DISTINCT VALUE root FROM root) AS r0"#
        );
    }

    #[test]
    fn test_filter_over_distinct_stays_flat() {
        let query = rows().distinct().where_(price_over(1)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT DISTINCT VALUE root FROM root WHERE (root["price"] > 1)"#
        );
    }

    #[test]
    fn test_first_or_default_argument_count() {
        let query = Expr::static_call(
            MethodRef::queryable("FirstOrDefault"),
            vec![rows().into_expr(), Expr::quote(price_over(1))],
            row(),
        );
        assert_eq!(
            translate(query),
            Err(TranslationError::InvalidArgumentCount {
                method: "FirstOrDefault".to_string(),
                expected: 0,
                actual: 1,
            })
        );
    }

    #[test]
    fn test_unknown_operator() {
        let query = Expr::static_call(
            MethodRef::queryable("Zip"),
            vec![rows().into_expr(), Expr::quote(lambda(title()))],
            TypeTag::query(TypeTag::Object),
        );
        assert_eq!(
            unsupported_message(translate(query)),
            "Method 'Zip' is not supported."
        );
    }

    // ========================================================================
    // Grouping
    // ========================================================================

    fn by_city(result: Expr) -> Expr {
        let city = Expr::member(r(), "city", TypeTag::String);
        let result = Lambda::new(
            vec![
                ParameterDecl {
                    name: "k".to_string(),
                    ty: TypeTag::String,
                },
                ParameterDecl {
                    name: "g".to_string(),
                    ty: TypeTag::array(row()),
                },
            ],
            result,
        );
        rows().group_by(lambda(city), result).into_expr()
    }

    fn group() -> Expr {
        Expr::parameter("g", TypeTag::array(row()))
    }

    #[test]
    fn test_group_by_with_aggregates() {
        let x = Expr::parameter("x", row());
        let count = Expr::static_call(MethodRef::enumerable("Count"), vec![group()], TypeTag::Int32);
        let total = Expr::static_call(
            MethodRef::enumerable("Sum"),
            vec![
                group(),
                Expr::quote(Lambda::unary("x", row(), Expr::member(x, "price", TypeTag::Int32))),
            ],
            TypeTag::Int32,
        );
        let query = by_city(Expr::new_anonymous(vec![
            ("key", Expr::parameter("k", TypeTag::String)),
            ("n", count),
            ("total", total),
        ]));
        let translated = translate(query).unwrap();
        assert_eq!(
            translated.spec.unwrap().query_text,
            r#"SELECT VALUE {"key": root["city"], "n": COUNT(1), "total": SUM(root["price"])} FROM root GROUP BY root["city"]"#
        );
        assert_eq!(translated.scalar_operation, ScalarOperationKind::None);
    }

    #[test]
    fn test_group_by_after_projection_reads_subquery() {
        let city = Expr::member(r(), "city", TypeTag::String);
        let projected = rows().select(lambda(Expr::new_anonymous(vec![("city", city)])));
        let c = Expr::parameter("c", TypeTag::Anonymous);
        let query = projected
            .group_by(
                Lambda::unary("c", TypeTag::Anonymous, Expr::member(c, "city", TypeTag::String)),
                Lambda::new(
                    vec![
                        ParameterDecl {
                            name: "k".to_string(),
                            ty: TypeTag::String,
                        },
                        ParameterDecl {
                            name: "g".to_string(),
                            ty: TypeTag::array(TypeTag::Anonymous),
                        },
                    ],
                    Expr::parameter("k", TypeTag::String),
                ),
            )
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE r0["city"] FROM (SELECT VALUE {"city": root["city"]} FROM root) AS r0 GROUP BY r0["city"]"#
        );
    }

    #[test]
    fn test_group_by_cannot_be_followed() {
        let query = Queryable::from_expr(by_city(Expr::parameter("k", TypeTag::String)))
            .where_(Lambda::unary(
                "k",
                TypeTag::String,
                Expr::compare(
                    BinaryOp::NotEqual,
                    Expr::parameter("k", TypeTag::String),
                    Expr::string(""),
                ),
            ))
            .into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "GroupBy cannot be followed by other methods"
        );
    }

    #[test]
    fn test_group_count_with_predicate_fails() {
        let count = Expr::static_call(
            MethodRef::enumerable("Count"),
            vec![group(), Expr::quote(price_over(1))],
            TypeTag::Int32,
        );
        assert!(matches!(
            translate(by_city(count)),
            Err(TranslationError::InvalidArgumentCount { .. })
        ));
    }

    #[test]
    fn test_invalid_top_level_expression() {
        assert!(unsupported_message(translate(Expr::int(1))).starts_with("Invalid expression"));
    }

    // ========================================================================
    // Array iteration
    // ========================================================================

    #[test]
    fn test_select_many_path() {
        let query = rows().select_many(lambda(tags())).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE v0 FROM root JOIN v0 IN root["tags"]"#);
    }

    #[test]
    fn test_select_many_query_ast() {
        let query = rows().select_many(lambda(tags())).into_expr();
        let ast = docql::linq::translate_to_sql_query(query, &TranslationOptions::new(), &Interpreter::new())
            .unwrap();
        assert_eq!(
            ast.from,
            vec![
                SqlCollection::Root {
                    name: "root".to_string()
                },
                SqlCollection::ArrayIterator {
                    name: "v0".to_string(),
                    path: SqlScalar::index(SqlScalar::property("root"), "tags"),
                },
            ]
        );
        assert_eq!(ast.filter, None);
    }

    #[test]
    fn test_select_many_after_projection() {
        let c = Expr::parameter("c", TypeTag::model("Child"));
        let query = rows()
            .select(lambda(child()))
            .select_many(Lambda::unary(
                "c",
                TypeTag::model("Child"),
                Expr::member(c, "tags", TypeTag::array(TypeTag::String)),
            ))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE v0 FROM root JOIN v0 IN root["child"]["tags"]"#
        );
    }

    #[test]
    fn test_select_many_with_inner_filter() {
        let t = Expr::parameter("t", TypeTag::String);
        let inner = Expr::static_call(
            MethodRef::enumerable("Where"),
            vec![
                tags(),
                Expr::quote(Lambda::unary(
                    "t",
                    TypeTag::String,
                    Expr::compare(BinaryOp::NotEqual, t, Expr::string("draft")),
                )),
            ],
            TypeTag::array(TypeTag::String),
        );
        let query = rows().select_many(lambda(inner)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE t0 FROM root JOIN t0 IN root["tags"] WHERE (t0 != "draft")"#
        );
    }

    // ========================================================================
    // Queries nested in lambda bodies
    // ========================================================================

    #[test]
    fn test_any_over_member_array_is_exists() {
        let any = over_tags("Any", vec![Expr::quote(tag_is("x"))], TypeTag::Boolean);
        let query = rows().where_(lambda(any)).into_expr();
        let translated = translate(query).unwrap();
        assert_eq!(
            translated.spec.unwrap().query_text,
            r#"SELECT VALUE root FROM root WHERE EXISTS(SELECT VALUE v0 FROM v0 IN root["tags"] WHERE (v0 = "x"))"#
        );
        assert_eq!(translated.scalar_operation, ScalarOperationKind::None);
    }

    #[test]
    fn test_any_without_predicate_is_exists() {
        let any = over_tags("Any", Vec::new(), TypeTag::Boolean);
        let query = rows().where_(lambda(any)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root FROM root WHERE EXISTS(SELECT VALUE v0 FROM v0 IN root["tags"])"#
        );
    }

    #[test]
    fn test_where_in_projection_is_array() {
        let t = Expr::parameter("t", TypeTag::String);
        let draft = Lambda::unary(
            "t",
            TypeTag::String,
            Expr::compare(BinaryOp::NotEqual, t, Expr::string("draft")),
        );
        let filtered = over_tags(
            "Where",
            vec![Expr::quote(draft)],
            TypeTag::array(TypeTag::String),
        );
        let query = rows().select(lambda(filtered)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE ARRAY(SELECT VALUE v0 FROM v0 IN root["tags"] WHERE (v0 != "draft")) FROM root"#
        );
    }

    #[test]
    fn test_count_with_predicate_in_projection_is_subquery() {
        let count = over_tags("Count", vec![Expr::quote(tag_is("x"))], TypeTag::Int32);
        let query = rows().select(lambda(count)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE (SELECT VALUE COUNT(1) FROM v0 IN root["tags"] WHERE (v0 = "x")) FROM root"#
        );
    }

    #[test]
    fn test_plain_count_of_member_array_is_array_length() {
        let count = over_tags("Count", Vec::new(), TypeTag::Int32);
        let query = rows().select(lambda(count)).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE ARRAY_LENGTH(root["tags"]) FROM root"#);
    }

    #[test]
    fn test_max_in_projection_reads_first_element() {
        let t = Expr::parameter("t", TypeTag::String);
        let max = over_tags(
            "Max",
            vec![Expr::quote(Lambda::unary("t", TypeTag::String, t))],
            TypeTag::String,
        );
        let query = rows().select(lambda(max)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE ARRAY(SELECT VALUE MAX(v0) FROM v0 IN root["tags"])[0] FROM root"#
        );
    }

    #[test]
    fn test_nested_aggregate_leaves_outer_query_alone() {
        let count = over_tags("Count", vec![Expr::quote(tag_is("x"))], TypeTag::Int32);
        let query = rows()
            .where_(lambda(Expr::compare(BinaryOp::GreaterThan, count, Expr::int(1))))
            .select(lambda(title()))
            .into_expr();
        let translated = translate(query).unwrap();
        assert_eq!(
            translated.spec.unwrap().query_text,
            r#"SELECT VALUE root["title"] FROM root WHERE ((SELECT VALUE COUNT(1) FROM v0 IN root["tags"] WHERE (v0 = "x")) > 1)"#
        );
        assert_eq!(translated.scalar_operation, ScalarOperationKind::None);
    }

    // ========================================================================
    // Scalar expressions
    // ========================================================================

    #[test]
    fn test_nested_member_access() {
        let name = Expr::member(child(), "name", TypeTag::String);
        let query = rows().select(lambda(name)).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE root["child"]["name"] FROM root"#);
    }

    #[test]
    fn test_non_finite_constant_fails() {
        let ratio = Expr::member(r(), "ratio", TypeTag::Double);
        let query = rows()
            .where_(lambda(Expr::compare(
                BinaryOp::LessThan,
                ratio,
                Expr::constant(f64::INFINITY, TypeTag::Double),
            )))
            .into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "Non-finite number inf is not supported"
        );
    }

    fn point_json() -> serde_json::Value {
        serde_json::json!({"type": "Point", "coordinates": [1.5, 2.5]})
    }

    fn near(point: Expr) -> Expr {
        let location = Expr::member(r(), "location", TypeTag::Geometry);
        Expr::compare(BinaryOp::Equal, location, point)
    }

    #[test]
    fn test_geometry_constant() {
        let point = Expr::constant(Value::Geometry(point_json()), TypeTag::Geometry);
        let text = sql(rows().where_(lambda(near(point))).into_expr());
        assert!(text.starts_with(r#"SELECT VALUE root FROM root WHERE (root["location"] = {"#), "{}", text);
        assert!(text.contains(r#""type": "Point""#), "{}", text);
        assert!(text.contains(r#""coordinates": [1.5, 2.5]"#), "{}", text);
    }

    #[test]
    fn test_geometry_construction_is_evaluated() {
        let interpreter =
            Interpreter::new().with_function("Geometry.new", |_| Ok(Value::Geometry(point_json())));
        let point = Expr::New {
            args: vec![Expr::constant(1.5f64, TypeTag::Double), Expr::constant(2.5f64, TypeTag::Double)],
            members: None,
            ty: TypeTag::Geometry,
        };
        let query = rows().where_(lambda(near(point))).into_expr();
        let text = docql::translate_query(query, &TranslationOptions::new(), &interpreter)
            .unwrap()
            .spec
            .unwrap()
            .query_text;
        assert!(text.contains(r#""type": "Point""#), "{}", text);
        assert!(text.contains(r#""coordinates": [1.5, 2.5]"#), "{}", text);
    }

    #[test]
    fn test_geometry_over_document_field_fails() {
        let point = Expr::New {
            args: vec![price(), Expr::constant(2.5f64, TypeTag::Double)],
            members: None,
            ty: TypeTag::Geometry,
        };
        let query = rows().where_(lambda(near(point))).into_expr();
        assert!(matches!(translate(query), Err(TranslationError::Host(_))));
    }

    #[test]
    fn test_nested_member_binding_fails() {
        let init = Expr::MemberInit {
            new: Box::new(Expr::New {
                args: Vec::new(),
                members: None,
                ty: row(),
            }),
            bindings: vec![MemberBinding::MemberMember {
                member: Member::new(row(), "child"),
                bindings: Vec::new(),
            }],
            ty: row(),
        };
        let query = rows().select(lambda(init)).into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "Binding of member 'child' is not supported"
        );
    }

    #[test]
    fn test_list_member_binding_fails() {
        let init = Expr::MemberInit {
            new: Box::new(Expr::New {
                args: Vec::new(),
                members: None,
                ty: row(),
            }),
            bindings: vec![MemberBinding::List {
                member: Member::new(row(), "tags"),
                initializers: vec![title()],
            }],
            ty: row(),
        };
        let query = rows().select(lambda(init)).into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "Binding of member 'tags' is not supported"
        );
    }

    #[test]
    fn test_constructor_with_arguments_fails() {
        let point = Expr::New {
            args: vec![price()],
            members: None,
            ty: TypeTag::model("Money"),
        };
        let query = rows().select(lambda(point)).into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "Constructor call on type Money is not supported"
        );
    }

    #[test]
    fn test_constructor_member_count_mismatch() {
        let shape = Expr::New {
            args: vec![price()],
            members: Some(vec![
                Member::new(TypeTag::Anonymous, "a"),
                Member::new(TypeTag::Anonymous, "b"),
            ]),
            ty: TypeTag::Anonymous,
        };
        let query = rows().select(lambda(shape)).into_expr();
        assert!(matches!(
            translate(query),
            Err(TranslationError::InvalidArgumentCount {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_string_compare_to() {
        let compare = Expr::method_call(
            title(),
            MethodRef::string("CompareTo"),
            vec![Expr::string("Z")],
            TypeTag::Int32,
        );
        let query = rows()
            .where_(lambda(Expr::compare(BinaryOp::GreaterThan, compare, Expr::int(0))))
            .into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE root FROM root WHERE (root["title"] > "Z")"#);
    }

    #[test]
    fn test_string_compare_to_mirrored() {
        let compare = Expr::method_call(
            title(),
            MethodRef::string("CompareTo"),
            vec![Expr::string("Z")],
            TypeTag::Int32,
        );
        let query = rows()
            .where_(lambda(Expr::compare(BinaryOp::GreaterThan, Expr::int(0), compare)))
            .into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE root FROM root WHERE (root["title"] < "Z")"#);
    }

    #[test]
    fn test_string_compare_to_rejects_not_equal() {
        let compare = Expr::method_call(
            title(),
            MethodRef::string("CompareTo"),
            vec![Expr::string("Z")],
            TypeTag::Int32,
        );
        let query = rows()
            .where_(lambda(Expr::compare(BinaryOp::NotEqual, compare, Expr::int(0))))
            .into_expr();
        assert!(matches!(
            translate(query),
            Err(TranslationError::UnsupportedExpressionShape(_))
        ));
    }

    #[test]
    fn test_contains_over_constant_list() {
        let names = Expr::constant(
            Value::Array(vec![Value::from("a"), Value::from("b")]),
            TypeTag::array(TypeTag::String),
        );
        let contains = Expr::static_call(
            MethodRef::enumerable("Contains"),
            vec![names, title()],
            TypeTag::Boolean,
        );

        let query = rows().where_(lambda(contains.clone())).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root FROM root WHERE (root["title"] IN ("a", "b"))"#
        );

        let negated = rows().where_(lambda(Expr::not(contains))).into_expr();
        assert_eq!(
            sql(negated),
            r#"SELECT VALUE root FROM root WHERE (root["title"] NOT IN ("a", "b"))"#
        );
    }

    #[test]
    fn test_contains_over_document_array() {
        let contains = Expr::static_call(
            MethodRef::enumerable("Contains"),
            vec![tags(), Expr::string("rust")],
            TypeTag::Boolean,
        );
        let query = rows().where_(lambda(contains)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root FROM root WHERE ARRAY_CONTAINS(root["tags"], "rust")"#
        );
    }

    #[test]
    fn test_contains_over_empty_list() {
        let contains = Expr::static_call(
            MethodRef::enumerable("Contains"),
            vec![
                Expr::constant(Value::Array(Vec::new()), TypeTag::array(TypeTag::String)),
                title(),
            ],
            TypeTag::Boolean,
        );
        let query = rows().where_(lambda(contains)).into_expr();
        assert_eq!(sql(query), "SELECT VALUE root FROM root WHERE false");
    }

    #[test]
    fn test_nullable_has_value() {
        let discount = Expr::member(r(), "discount", TypeTag::nullable(TypeTag::Double));
        let has_value = Expr::member(discount, "HasValue", TypeTag::Boolean);
        let query = rows().where_(lambda(has_value)).into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE root FROM root WHERE IS_DEFINED(root["discount"])"#
        );
    }

    #[test]
    fn test_string_methods() {
        let starts = Expr::method_call(
            title(),
            MethodRef::string("StartsWith"),
            vec![Expr::string("The")],
            TypeTag::Boolean,
        );
        let upper = Expr::method_call(title(), MethodRef::string("ToUpper"), Vec::new(), TypeTag::String);
        let query = rows()
            .where_(lambda(starts))
            .select(lambda(upper))
            .into_expr();
        assert_eq!(
            sql(query),
            r#"SELECT VALUE UPPER(root["title"]) FROM root WHERE STARTSWITH(root["title"], "The")"#
        );
    }

    #[test]
    fn test_string_concatenation() {
        let label = Expr::binary(BinaryOp::Add, title(), Expr::string("!"), TypeTag::String);
        let query = rows().select(lambda(label)).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE (root["title"] || "!") FROM root"#);
    }

    #[test]
    fn test_math_function() {
        let abs = Expr::static_call(MethodRef::math("Abs"), vec![price()], TypeTag::Int32);
        let query = rows().select(lambda(abs)).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE ABS(root["price"]) FROM root"#);
    }

    #[test]
    fn test_user_defined_function() {
        let call = Expr::static_call(
            MethodRef::new(DeclaringType::UserFunction, "Invoke"),
            vec![Expr::string("tax"), price()],
            TypeTag::Double,
        );
        let query = rows().select(lambda(call)).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE udf.tax(root["price"]) FROM root"#);
    }

    #[test]
    fn test_user_defined_function_array_arguments() {
        let call = Expr::static_call(
            MethodRef::new(DeclaringType::UserFunction, "Invoke"),
            vec![
                Expr::string("tax"),
                Expr::new_array(vec![price(), Expr::int(2)], TypeTag::Object),
            ],
            TypeTag::Double,
        );
        let query = rows().select(lambda(call)).into_expr();
        assert_eq!(sql(query), r#"SELECT VALUE udf.tax(root["price"], 2) FROM root"#);
    }

    #[test]
    fn test_user_defined_function_invalid_name() {
        let call = Expr::static_call(
            MethodRef::new(DeclaringType::UserFunction, "Invoke"),
            vec![Expr::string("drop table"), price()],
            TypeTag::Double,
        );
        let query = rows().select(lambda(call)).into_expr();
        assert!(matches!(
            translate(query),
            Err(TranslationError::UnsupportedExpressionShape(_))
        ));
    }

    #[test]
    fn test_unknown_host_method() {
        let call = Expr::static_call(MethodRef::host("Pricing", "Discount"), vec![price()], TypeTag::Int32);
        let query = rows().select(lambda(call)).into_expr();
        assert_eq!(
            unsupported_message(translate(query)),
            "Method 'Pricing.Discount' is not supported."
        );
    }

    // ========================================================================
    // Naming and parameters
    // ========================================================================

    #[test]
    fn test_camel_case_policy() {
        let options = TranslationOptions::new().naming(NamingPolicy::CamelCase);
        let query = rows()
            .where_(lambda(Expr::compare(
                BinaryOp::GreaterThan,
                Expr::member(r(), "Price", TypeTag::Int32),
                Expr::int(100),
            )))
            .into_expr();
        assert_eq!(
            sql_with(query, &options),
            r#"SELECT VALUE root FROM root WHERE (root["price"] > 100)"#
        );
    }

    #[test]
    fn test_wire_name_override() {
        let schema = Schema::new().model(
            "Row",
            ModelMeta::new().field("price", FieldMeta::new().wire_name("cost")),
        );
        let options = TranslationOptions::new().schema(schema);
        let query = rows().where_(price_over(100)).into_expr();
        assert_eq!(
            sql_with(query, &options),
            r#"SELECT VALUE root FROM root WHERE (root["cost"] > 100)"#
        );
    }

    #[test]
    fn test_enum_converter_rewrites_literal() {
        let mut variants = IndexMap::new();
        variants.insert(0, "Draft".to_string());
        variants.insert(1, "Published".to_string());
        let schema = Schema::new().model(
            "Row",
            ModelMeta::new().field(
                "status",
                FieldMeta::new().converter(Converter::EnumAsString(variants)),
            ),
        );
        let options = TranslationOptions::new().schema(schema);

        let status_ty = TypeTag::Enum("Status".to_string());
        let query = rows()
            .where_(lambda(Expr::compare(
                BinaryOp::Equal,
                Expr::member(r(), "status", status_ty.clone()),
                Expr::constant(1i64, status_ty),
            )))
            .into_expr();
        assert_eq!(
            sql_with(query, &options),
            r#"SELECT VALUE root FROM root WHERE (root["status"] = "Published")"#
        );
    }

    #[test]
    fn test_bound_parameters() {
        let options = TranslationOptions::new()
            .parameter("@minPrice", 100i64)
            .parameter("unused", 7i64);
        let query = rows().where_(price_over(100)).into_expr();
        let spec = translate_with(query, &options).unwrap().spec.unwrap();
        assert_eq!(
            spec.query_text,
            r#"SELECT VALUE root FROM root WHERE (root["price"] > @minPrice)"#
        );
        assert_eq!(spec.parameters.len(), 1);
        assert_eq!(spec.parameters[0].name, "@minPrice");
    }

    #[test]
    fn test_pretty_output() {
        let options = TranslationOptions::new().pretty(true);
        let query = rows().where_(price_over(100)).into_expr();
        assert_eq!(
            sql_with(query, &options),
            "SELECT VALUE root\nFROM root\nWHERE (root[\"price\"] > 100)"
        );
    }

    // ========================================================================
    // Raw query escape
    // ========================================================================

    #[test]
    fn test_raw_query_text() {
        let query = rows().from_sql(Expr::string("SELECT * FROM c")).into_expr();
        let translated = translate(query).unwrap();
        assert_eq!(translated.spec.unwrap().query_text, "SELECT * FROM c");
        assert_eq!(translated.scalar_operation, ScalarOperationKind::None);
    }

    #[test]
    fn test_raw_query_text_from_host_function() {
        let interpreter = Interpreter::new()
            .with_function("Queries.All", |_| Ok(Value::from("SELECT * FROM c")));
        let raw = Expr::static_call(MethodRef::host("Queries", "All"), Vec::new(), TypeTag::String);
        let query = rows().from_sql(raw).into_expr();
        let translated =
            docql::translate_query(query, &TranslationOptions::new(), &interpreter).unwrap();
        assert_eq!(translated.spec.unwrap().query_text, "SELECT * FROM c");
    }

    #[test]
    fn test_raw_query_null_is_malformed() {
        let query = rows().from_sql(Expr::null(TypeTag::String)).into_expr();
        assert!(matches!(
            translate(query),
            Err(TranslationError::MalformedConstantEscape(_))
        ));
    }

    #[test]
    fn test_raw_query_number_is_malformed() {
        let query = rows().from_sql(Expr::int(3)).into_expr();
        assert!(matches!(
            translate(query),
            Err(TranslationError::MalformedConstantEscape(_))
        ));
    }
}
