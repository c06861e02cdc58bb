// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::BTreeMap;

use tessera_engine::{
    smart_split, Context, Error, FilterExpression, Node, NodeList, OutputStream, Parser, TagNode,
    Value,
};

use super::parse_body;

const FORLOOP: &str = "forloop";

/// `{% for x, y in items [reversed] %}...{% empty %}...{% endfor %}`.
#[derive(Debug)]
pub struct ForNode {
    loop_vars: Vec<String>,
    items: FilterExpression,
    reversed: bool,
    loop_nodes: NodeList,
    empty_nodes: NodeList,
}

impl ForNode {
    pub fn loop_vars(&self) -> &[String] {
        &self.loop_vars
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    fn forloop(len: usize, index: usize, parent: &Value) -> Value {
        let mut forloop = BTreeMap::new();
        forloop.insert("counter0".to_string(), Value::from(index as i64));
        forloop.insert("counter".to_string(), Value::from(index as i64 + 1));
        forloop.insert("revcounter".to_string(), Value::from((len - index) as i64));
        forloop.insert("revcounter0".to_string(), Value::from((len - index - 1) as i64));
        forloop.insert("first".to_string(), Value::from(index == 0));
        forloop.insert("last".to_string(), Value::from(index + 1 == len));
        if parent.is_valid() {
            forloop.insert("parentloop".to_string(), parent.clone());
        }
        Value::Map(forloop)
    }

    fn bind_item(&self, item: Value, ctx: &mut Context) -> Result<(), Error> {
        match (self.loop_vars.as_slice(), item) {
            ([single], item) => ctx.insert(single.as_str(), item),
            (vars, Value::List(values)) => {
                let mut values = values.into_iter();
                for var in vars {
                    ctx.insert(var.as_str(), values.next().unwrap_or_default());
                }
            }
            (vars, item) => {
                for var in vars {
                    let value = item.attribute(var, ctx)?;
                    ctx.insert(var.as_str(), value);
                }
            }
        }
        Ok(())
    }

    fn render_items(
        &self,
        items: Vec<Value>,
        stream: &mut OutputStream<'_>,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        let parent = ctx.lookup(FORLOOP);
        let len = items.len();
        let ordered: Box<dyn Iterator<Item = Value>> = if self.reversed {
            Box::new(items.into_iter().rev())
        } else {
            Box::new(items.into_iter())
        };
        ctx.scoped(|ctx| -> Result<(), Error> {
            for (index, item) in ordered.enumerate() {
                ctx.insert(FORLOOP, Self::forloop(len, index, &parent));
                self.bind_item(item, ctx)?;
                self.loop_nodes.render(stream, ctx)?;
            }
            Ok(())
        })
    }
}

impl TagNode for ForNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        let items = match self.items.resolve_value(ctx)? {
            // Maps iterate as (key, value) pairs, unpacked when two names are given.
            Value::Map(map) => map
                .into_iter()
                .map(|(key, value)| Value::List(vec![Value::from(key), value]))
                .collect(),
            other => other.to_list(),
        };
        if items.is_empty() {
            return self.empty_nodes.render(stream, ctx);
        }
        self.render_items(items, stream, ctx)
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.loop_nodes, &self.empty_nodes]
    }
}

pub(crate) fn for_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let mut parts = smart_split(content);
    let reversed = parts.last().is_some_and(|last| last == "reversed");
    if reversed {
        parts.pop();
    }
    let malformed = || {
        Error::tag_syntax(format!(
            "'for' statements should use the format 'for x in y': {content}"
        ))
    };
    if parts.len() < 4 || parts[parts.len() - 2] != "in" {
        return Err(malformed());
    }
    let loop_vars: Vec<String> = parts[1..parts.len() - 2]
        .iter()
        .flat_map(|part| part.split(','))
        .filter(|var| !var.is_empty())
        .map(str::to_string)
        .collect();
    if loop_vars.is_empty() {
        return Err(malformed());
    }
    let items = parser.filter_expression(&parts[parts.len() - 1])?;

    let loop_nodes = parser.parse(&["empty", "endfor"])?;
    let empty_nodes = match parser.take_next_token() {
        Some(token) if token.content == "empty" => parse_body(parser, "endfor")?,
        _ => NodeList::new(),
    };
    Ok(Node::tag(ForNode {
        loop_vars,
        items,
        reversed,
        loop_nodes,
        empty_nodes,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tessera_engine::Context;

    fn render(source: &str, data: serde_json::Value) -> String {
        crate::engine()
            .new_template(source, "for")
            .and_then(|t| t.render(&mut Context::from_json(data)))
            .unwrap_or_else(|err| panic!("{source}: {err}"))
    }

    #[test]
    fn iterates_lists_and_reversed() {
        let data = json!({"items": [1, 2, 3]});
        assert_eq!(render("{% for i in items %}{{ i }}{% endfor %}", data.clone()), "123");
        assert_eq!(
            render("{% for i in items reversed %}{{ i }}{% endfor %}", data),
            "321"
        );
    }

    #[test]
    fn forloop_counters() {
        let data = json!({"items": ["a", "b", "c"]});
        let source = "{% for i in items %}{{ forloop.counter }}{{ forloop.counter0 }}\
                      {{ forloop.revcounter }}{{ forloop.revcounter0 }}\
                      {% if forloop.first %}F{% endif %}{% if forloop.last %}L{% endif %},{% endfor %}";
        assert_eq!(render(source, data), "1032F,2121,3210L,");
    }

    #[test]
    fn nested_loops_see_their_parent() {
        let data = json!({"outer": ["x", "y"], "inner": [1, 2]});
        let source = "{% for o in outer %}{% for i in inner %}\
                      {{ forloop.parentloop.counter }}{{ o }}{{ i }} {% endfor %}{% endfor %}";
        assert_eq!(render(source, data), "1x1 1x2 2y1 2y2 ");
    }

    #[test]
    fn empty_branch_and_scope() {
        let source = "{% for i in items %}{{ i }}{% empty %}none{% endfor %}[{{ i }}{{ forloop }}]";
        assert_eq!(render(source, json!({"items": []})), "none[]");
        assert_eq!(render(source, json!({})), "none[]");
        assert_eq!(render(source, json!({"items": ["z"]})), "z[]");
    }

    #[test]
    fn unpacks_pairs_and_maps() {
        let data = json!({"pairs": [["a", 1], ["b"]], "map": {"k1": "v1", "k2": "v2"}});
        assert_eq!(
            render("{% for x, y in pairs %}{{ x }}={{ y }};{% endfor %}", data.clone()),
            "a=1;b=;"
        );
        assert_eq!(
            render("{% for k, v in map %}{{ k }}:{{ v }} {% endfor %}", data.clone()),
            "k1:v1 k2:v2 "
        );
        assert_eq!(
            render("{% for pair in map %}{{ pair.0 }}{% endfor %}", data),
            "k1k2"
        );
    }

    #[test]
    fn unpacks_attributes_from_objects() {
        let data = json!({"people": [{"name": "Ada", "age": 36}, {"name": "Alan"}]});
        assert_eq!(
            render("{% for name,age in people %}{{ name }}{{ age }} {% endfor %}", data),
            "Ada36 Alan "
        );
    }

    #[test]
    fn strings_iterate_by_character() {
        assert_eq!(
            render("{% for c in word %}{{ c }}.{% endfor %}", json!({"word": "abc"})),
            "a.b.c."
        );
    }

    #[test]
    fn malformed_loops() {
        let engine = crate::engine();
        for source in [
            "{% for %}{% endfor %}",
            "{% for x items %}{% endfor %}",
            "{% for x on items %}{% endfor %}",
        ] {
            let err = engine.new_template(source, "bad").unwrap_err();
            assert!(err.to_string().contains("'for x in y'"), "{source}: {err}");
        }
    }
}
