// SPDX-License-Identifier: Apache-2.0 OR MIT
use tessera_engine::{
    smart_split, Context, Error, FilterExpression, Node, NodeList, OutputStream, Parser, TagNode,
};

use super::parse_body;

/// `{% if [not] expr %}...{% else %}...{% endif %}`.
#[derive(Debug)]
pub struct IfNode {
    condition: FilterExpression,
    negate: bool,
    true_nodes: NodeList,
    false_nodes: NodeList,
}

impl IfNode {
    pub fn condition(&self) -> &FilterExpression {
        &self.condition
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }
}

impl TagNode for IfNode {
    fn render(&self, stream: &mut OutputStream<'_>, ctx: &mut Context) -> Result<(), Error> {
        if self.condition.is_true(ctx)? != self.negate {
            self.true_nodes.render(stream, ctx)
        } else {
            self.false_nodes.render(stream, ctx)
        }
    }

    fn child_lists(&self) -> Vec<&NodeList> {
        vec![&self.true_nodes, &self.false_nodes]
    }
}

pub(crate) fn if_factory(content: &str, parser: &mut Parser<'_>) -> Result<Node, Error> {
    let parts = smart_split(content);
    let (negate, expression) = match parts.as_slice() {
        [_, expression] => (false, expression),
        [_, not, expression] if not == "not" => (true, expression),
        [_] => {
            return Err(Error::tag_syntax(
                "'if' statement requires at least one argument",
            ))
        }
        _ => {
            return Err(Error::tag_syntax(format!(
                "'if' takes one expression, optionally prefixed by 'not': {content}"
            )))
        }
    };
    let condition = parser.filter_expression(expression)?;

    let true_nodes = parser.parse(&["else", "endif"])?;
    let false_nodes = match parser.take_next_token() {
        Some(token) if token.content == "else" => parse_body(parser, "endif")?,
        _ => NodeList::new(),
    };
    Ok(Node::tag(IfNode {
        condition,
        negate,
        true_nodes,
        false_nodes,
    }))
}
