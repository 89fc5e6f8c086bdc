//! Built-in template directives, used for completion and hover.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Documentation for one built-in directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveDef {
    pub name: &'static str,
    /// Shorthand prefix, if the directive has one (`:` for `v-bind`).
    pub shorthand: Option<&'static str>,
    pub expects: &'static str,
    pub description: &'static str,
    pub example: Option<&'static str>,
}

pub static DIRECTIVES: &[DirectiveDef] = &[
    DirectiveDef {
        name: "v-text",
        shorthand: None,
        expects: "string",
        description: "Updates the element's text content.",
        example: Some(r#"<span v-text="msg"></span>"#),
    },
    DirectiveDef {
        name: "v-html",
        shorthand: None,
        expects: "string",
        description: "Updates the element's innerHTML. Contents are inserted as plain HTML and are not compiled as template syntax.",
        example: Some(r#"<div v-html="html"></div>"#),
    },
    DirectiveDef {
        name: "v-show",
        shorthand: None,
        expects: "any",
        description: "Toggles the element's visibility based on the truthiness of the expression value.",
        example: Some(r#"<h1 v-show="ok">Hello!</h1>"#),
    },
    DirectiveDef {
        name: "v-if",
        shorthand: None,
        expects: "any",
        description: "Conditionally renders an element or a template fragment based on the truthiness of the expression value.",
        example: Some(r#"<div v-if="type === 'A'">A</div>"#),
    },
    DirectiveDef {
        name: "v-else",
        shorthand: None,
        expects: "nothing",
        description: "Denotes the \"else block\" for `v-if` or a `v-if` / `v-else-if` chain.",
        example: Some(r#"<div v-else>Not A</div>"#),
    },
    DirectiveDef {
        name: "v-else-if",
        shorthand: None,
        expects: "any",
        description: "Denotes the \"else if block\" for `v-if`. Can be chained.",
        example: Some(r#"<div v-else-if="type === 'B'">B</div>"#),
    },
    DirectiveDef {
        name: "v-for",
        shorthand: None,
        expects: "Array | Object | number | string | Iterable",
        description: "Renders the element or template block multiple times based on the source data.",
        example: Some(r#"<li v-for="item in items" :key="item.id">{{ item.text }}</li>"#),
    },
    DirectiveDef {
        name: "v-on",
        shorthand: Some("@"),
        expects: "Function | Inline Statement | Object",
        description: "Attaches an event listener to the element.",
        example: Some(r#"<button @click="doThis"></button>"#),
    },
    DirectiveDef {
        name: "v-bind",
        shorthand: Some(":"),
        expects: "any (with argument) | Object (without argument)",
        description: "Dynamically binds one or more attributes, or a component prop to an expression.",
        example: Some(r#"<img :src="imageSrc" />"#),
    },
    DirectiveDef {
        name: "v-model",
        shorthand: None,
        expects: "varies based on value of form inputs element or output of components",
        description: "Creates a two-way binding on a form input element or a component.",
        example: Some(r#"<input v-model="message" />"#),
    },
    DirectiveDef {
        name: "v-slot",
        shorthand: Some("#"),
        expects: "JavaScript expression that is valid in a function argument position",
        description: "Denotes named slots or scoped slots that expect to receive props.",
        example: Some(r#"<template #header="{ title }">{{ title }}</template>"#),
    },
    DirectiveDef {
        name: "v-pre",
        shorthand: None,
        expects: "nothing",
        description: "Skips compilation for this element and all its children.",
        example: Some(r#"<span v-pre>{{ this will not be compiled }}</span>"#),
    },
    DirectiveDef {
        name: "v-once",
        shorthand: None,
        expects: "nothing",
        description: "Renders the element and component once only, and skips future updates.",
        example: None,
    },
    DirectiveDef {
        name: "v-memo",
        shorthand: None,
        expects: "any[]",
        description: "Memoizes a sub-tree of the template; re-renders only when a value in the dependency array changes.",
        example: Some(r#"<div v-memo="[valueA, valueB]"></div>"#),
    },
    DirectiveDef {
        name: "v-cloak",
        shorthand: None,
        expects: "nothing",
        description: "Hides un-compiled template until it is ready.",
        example: None,
    },
];

static BY_NAME: LazyLock<HashMap<&'static str, &'static DirectiveDef>> =
    LazyLock::new(|| DIRECTIVES.iter().map(|d| (d.name, d)).collect());

/// Look up a directive by its full name or by its attribute spelling
/// (`v-bind:href`, `:href`, `@click`, `#default`).
pub fn get_directive(attribute: &str) -> Option<&'static DirectiveDef> {
    let name = match attribute.as_bytes().first() {
        Some(b':') => "v-bind",
        Some(b'@') => "v-on",
        Some(b'#') => "v-slot",
        _ => attribute
            .split([':', '.'])
            .next()
            .unwrap_or(attribute),
    };
    BY_NAME.get(name).copied()
}

/// Markdown documentation for a directive.
pub(crate) fn format_directive_docs(directive: &DirectiveDef) -> String {
    let mut doc = format!(
        "**{}**\n\nExpects: `{}`\n\n{}",
        directive.name, directive.expects, directive.description
    );
    if let Some(shorthand) = directive.shorthand {
        doc.push_str(&format!("\n\n*Shorthand:* `{shorthand}`"));
    }
    if let Some(example) = directive.example {
        doc.push_str(&format!("\n\n*Example:* `{example}`"));
    }
    doc
}
