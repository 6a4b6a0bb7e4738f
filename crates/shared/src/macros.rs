// crates/shared/src/macros.rs

/// Declares a toolbelt in one table: tool names, handler methods, and the
/// parameter schemas the model sees. Expands to a `Toolbelt` impl whose
/// schema list and dispatch table are generated from the same entries, so
/// the two can never drift apart. Array parameters take an element type in
/// brackets after the type tag, e.g. `"ids": "array" ["integer"] => "..."`.
#[macro_export]
macro_rules! register_toolbelt {
    (
        $toolbelt_type:ty {
            tools: {
                $(
                    $name:literal => $method:ident {
                        description: $desc:literal,
                        params: [$($param_name:literal: $param_type:literal $([$items:literal])? => $param_desc:literal),* $(,)?]
                    }
                ),* $(,)?
            }
        }
    ) => {
        impl $crate::tools::Toolbelt for $toolbelt_type {
            fn schemas(&self) -> Vec<$crate::schemas::ToolSchema> {
                vec![
                    $(
                        $crate::schemas::ToolSchema {
                            name: $name,
                            description: $desc,
                            parameters: vec![
                                $(
                                    $crate::schemas::ParameterSchema {
                                        name: $param_name,
                                        type_name: $param_type,
                                        items: $crate::register_toolbelt!(@items $($items)?),
                                        description: $param_desc,
                                        required: true,
                                    }
                                ),*
                            ],
                        }
                    ),*
                ]
            }

            fn has_tool(&self, name: &str) -> bool {
                match name {
                    $($name => true,)*
                    _ => false,
                }
            }

            fn dispatch(&self, name: &str, args: &::serde_json::Value) -> ::anyhow::Result<String> {
                match name {
                    $($name => self.$method(args),)*
                    _ => Err(::anyhow::anyhow!("Tool '{}' not found", name)),
                }
            }
        }
    };

    (@items) => { None };
    (@items $items:literal) => { Some($items) };
}

#[cfg(test)]
mod tests {
    use crate::tools::Toolbelt;

    struct Counter;

    impl Counter {
        fn add(&self, args: &serde_json::Value) -> anyhow::Result<String> {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok((a + b).to_string())
        }

        fn sum_all(&self, args: &serde_json::Value) -> anyhow::Result<String> {
            let total: i64 = args["values"]
                .as_array()
                .map(|v| v.iter().filter_map(|x| x.as_i64()).sum())
                .unwrap_or(0);
            Ok(total.to_string())
        }
    }

    register_toolbelt! {
        Counter {
            tools: {
                "add" => add {
                    description: "Add two integers",
                    params: ["a": "integer" => "Left operand", "b": "integer" => "Right operand"]
                },
                "sum_all" => sum_all {
                    description: "Sum a list of integers",
                    params: ["values": "array" ["integer"] => "Integers to sum"]
                },
            }
        }
    }

    #[test]
    fn schemas_and_dispatch_come_from_one_table() {
        let belt = Counter;
        let schemas = belt.schemas();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].name, "add");
        assert_eq!(schemas[0].parameters.len(), 2);
        assert!(schemas[0].parameters.iter().all(|p| p.required));
        assert_eq!(schemas[1].parameters[0].items, Some("integer"));

        assert!(belt.has_tool("add"));
        assert!(!belt.has_tool("subtract"));

        let result = belt
            .dispatch("add", &serde_json::json!({"a": 2, "b": 3}))
            .unwrap();
        assert_eq!(result, "5");

        let result = belt
            .dispatch("sum_all", &serde_json::json!({"values": [1, 2, 3]}))
            .unwrap();
        assert_eq!(result, "6");
    }
}
