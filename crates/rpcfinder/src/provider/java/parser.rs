//! Declaration extraction from Java source files using tree-sitter.
//!
//! Only what contract discovery needs is kept: the package, imports, type
//! declarations with their annotations and implemented interfaces, and the
//! methods each type declares. Method bodies are never entered, so local and
//! anonymous classes are not reported.

use std::cell::RefCell;
use std::path::Path;

// Thread-local parser reuse - avoids creating a new parser per file
thread_local! {
    static JAVA_PARSER: RefCell<tree_sitter::Parser> = RefCell::new({
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .expect("tree-sitter-java grammar incompatible with tree-sitter version");
        parser
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
}

/// Declarations found in one compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub package: Option<String>,
    /// Single-type imports as written ("com.acme.UserService") and
    /// on-demand imports with a trailing `*` ("com.acme.*"). Static imports
    /// are skipped.
    pub imports: Vec<String>,
    pub types: Vec<ParsedType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub name: String,
    /// Package-qualified, with enclosing types: "com.acme.Outer.Inner"
    pub qualified: String,
    pub kind: TypeKind,
    /// Annotation names as written, without `@` or arguments
    pub annotations: Vec<String>,
    /// Implemented interface names as written, generic arguments stripped
    pub interfaces: Vec<String>,
    pub methods: Vec<ParsedMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMethod {
    pub name: String,
    pub is_override: bool,
    /// Byte offset of the method name
    pub offset: usize,
}

/// Parse one Java file. Unparsable input yields an empty result.
pub fn parse_java(file: &Path, source: &str) -> ParsedFile {
    JAVA_PARSER.with(|parser| {
        let mut parser = parser.borrow_mut();

        let tree = match parser.parse(source, None) {
            Some(tree) => tree,
            None => {
                tracing::warn!("Failed to parse file: {:?}", file);
                return ParsedFile::default();
            }
        };

        let root = tree.root_node();
        let source = source.as_bytes();
        let package = extract_package_name(&root, source);

        let mut result = ParsedFile {
            imports: extract_imports(&root, source),
            package: package.clone(),
            types: Vec::new(),
        };

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            extract_type(&child, source, package.as_deref(), &mut result.types);
        }

        result
    })
}

/// Extract package name from a compilation unit
fn extract_package_name(root: &tree_sitter::Node, source: &[u8]) -> Option<String> {
    let package = find_child_by_kind(root, "package_declaration")?;
    let name = find_child_by_kind(&package, "scoped_identifier")
        .or_else(|| find_child_by_kind(&package, "identifier"))?;
    name.utf8_text(source).ok().map(str::to_string)
}

fn extract_imports(root: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();

    for child in root.children(&mut cursor) {
        if child.kind() != "import_declaration" {
            continue;
        }
        if find_child_by_kind(&child, "static").is_some() {
            continue;
        }

        let Some(name) = find_child_by_kind(&child, "scoped_identifier")
            .or_else(|| find_child_by_kind(&child, "identifier"))
            .and_then(|n| n.utf8_text(source).ok())
        else {
            continue;
        };

        if find_child_by_kind(&child, "asterisk").is_some() {
            imports.push(format!("{}.*", name));
        } else {
            imports.push(name.to_string());
        }
    }

    imports
}

fn type_kind(node: &tree_sitter::Node) -> Option<TypeKind> {
    match node.kind() {
        "class_declaration" => Some(TypeKind::Class),
        "interface_declaration" => Some(TypeKind::Interface),
        "enum_declaration" => Some(TypeKind::Enum),
        "record_declaration" => Some(TypeKind::Record),
        _ => None,
    }
}

/// Build a qualified name with package (or enclosing type) prefix
fn qualified_name(name: &str, scope: Option<&str>) -> String {
    match scope {
        Some(p) => format!("{}.{}", p, name),
        None => name.to_string(),
    }
}

fn extract_type(node: &tree_sitter::Node, source: &[u8], scope: Option<&str>, out: &mut Vec<ParsedType>) {
    let Some(kind) = type_kind(node) else {
        return;
    };
    let Some(name) = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(source).ok())
    else {
        return;
    };

    let qualified = qualified_name(name, scope);
    let mut methods = Vec::new();
    let mut nested = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        collect_members(&body, source, &qualified, &mut methods, &mut nested);
    }

    out.push(ParsedType {
        name: name.to_string(),
        qualified,
        kind,
        annotations: extract_annotations(node, source),
        interfaces: extract_interfaces(node, source),
        methods,
    });
    out.extend(nested);
}

fn collect_members(
    body: &tree_sitter::Node,
    source: &[u8],
    owner: &str,
    methods: &mut Vec<ParsedMethod>,
    nested: &mut Vec<ParsedType>,
) {
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "method_declaration" => {
                if let Some(method) = extract_method(&child, source) {
                    methods.push(method);
                }
            }
            // Enum bodies keep their members one level down
            "enum_body_declarations" => collect_members(&child, source, owner, methods, nested),
            _ => extract_type(&child, source, Some(owner), nested),
        }
    }
}

fn extract_method(node: &tree_sitter::Node, source: &[u8]) -> Option<ParsedMethod> {
    let name_node = node.child_by_field_name("name")?;
    let name = name_node.utf8_text(source).ok()?;

    let is_override = extract_annotations(node, source)
        .iter()
        .any(|a| a == "Override" || a == "java.lang.Override");

    Some(ParsedMethod {
        name: name.to_string(),
        is_override,
        offset: name_node.start_byte(),
    })
}

/// Extract annotation names (e.g. "Override", "com.acme.Contract")
fn extract_annotations(node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut annotations = Vec::new();

    if let Some(modifiers) = find_child_by_kind(node, "modifiers") {
        let mut cursor = modifiers.walk();
        for child in modifiers.children(&mut cursor) {
            if child.kind() == "marker_annotation" || child.kind() == "annotation" {
                if let Some(name) = child
                    .child_by_field_name("name")
                    .and_then(|n| n.utf8_text(source).ok())
                {
                    annotations.push(name.to_string());
                }
            }
        }
    }

    annotations
}

/// Extract interfaces from an implements clause
fn extract_interfaces(node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut interfaces = Vec::new();

    let Some(type_list) = find_child_by_kind(node, "super_interfaces")
        .and_then(|clause| find_child_by_kind(&clause, "type_list"))
    else {
        return interfaces;
    };

    let mut cursor = type_list.walk();
    for child in type_list.children(&mut cursor) {
        if matches!(
            child.kind(),
            "type_identifier" | "generic_type" | "scoped_type_identifier"
        ) {
            if let Ok(text) = child.utf8_text(source) {
                interfaces.push(strip_type_arguments(text));
            }
        }
    }

    interfaces
}

/// "Repository<User>" -> "Repository"
fn strip_type_arguments(text: &str) -> String {
    let base = text.split('<').next().unwrap_or(text);
    base.chars().filter(|c| !c.is_whitespace()).collect()
}

fn find_child_by_kind<'a>(node: &tree_sitter::Node<'a>, kind: &str) -> Option<tree_sitter::Node<'a>> {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            if cursor.node().kind() == kind {
                return Some(cursor.node());
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    None
}
