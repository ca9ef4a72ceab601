use elif_inject::{Binder, Element, Module, Source, Stage};

/// Run `module` against a fresh recording binder
///
/// Nothing is constructed; the result is the module's declarations in
/// encounter order, including any errors it reported.
pub(crate) fn capture_declarations(module: &dyn Module, stage: Stage) -> Vec<Element> {
    let mut binder = Binder::new(stage);
    let source = Source::described(format!("private module {}", module.name()));
    binder.install_from(source, module);

    let elements = binder.into_elements();
    tracing::debug!(
        module = module.name(),
        declarations = elements.len(),
        "Captured private declarations"
    );
    elements
}
