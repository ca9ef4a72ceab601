//! Integration tests for private modules
//!
//! Covers exposure forwarding, isolation of unexposed bindings, the one-shot
//! private injector, re-entry protection and construction ordering against
//! the enclosing injector's eager singletons.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use elif_inject::container::bound_keys;
use elif_inject::{module_fn, Binder, CoreError, Injector, Key, Module, Stage};
use elif_private::{
    ExposedKeyBuilder, PassPhase, PrivateBinder, PrivateModule, PrivateModuleConfig,
    PrivateModuleError, ProviderMethod,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, PartialEq)]
struct A(u32);

#[derive(Debug)]
struct B(String);

#[derive(Debug)]
struct C;

struct Primary;
struct Secondary;

/// Binds `A` and `B`, exposes `A`, counts private injector builds
struct AnswerModule {
    builds: Arc<AtomicUsize>,
}

impl AnswerModule {
    fn new() -> Self {
        Self {
            builds: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PrivateModuleConfig for AnswerModule {
    fn configure_private_bindings(
        &self,
        binder: &mut PrivateBinder<'_>,
    ) -> Result<(), CoreError> {
        binder.bind::<A>().singleton().to_provider(|_| Ok(A(42)));
        binder.bind::<B>().to_instance(B("x".to_string()));

        let builds = self.builds.clone();
        binder.request_injection(move |_| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        binder.expose::<A>()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "AnswerModule"
    }
}

#[test]
fn test_exposed_key_resolves_from_public_injector() {
    init_tracing();
    let module = PrivateModule::new(AnswerModule::new());
    let injector = Injector::create(&[&module]).unwrap();

    assert_eq!(*injector.get_instance::<A>().unwrap(), A(42));
    assert_eq!(module.phase(), PassPhase::Idle);
}

#[test]
fn test_unexposed_bindings_stay_hidden() {
    let module = PrivateModule::new(AnswerModule::new());
    let injector = Injector::create(&[&module]).unwrap();

    assert!(injector.get_instance::<B>().unwrap_err().is_service_not_found());
    assert!(!injector.can_resolve(&Key::of::<B>()));

    let private = module.private_injector().unwrap();
    assert_eq!(private.get_instance::<B>().unwrap().0, "x");
}

#[test]
fn test_forwarded_value_is_the_private_instance() {
    let module = PrivateModule::new(AnswerModule::new());
    let injector = Injector::create(&[&module]).unwrap();
    let private = module.private_injector().unwrap();

    let public_value = injector.get_instance::<A>().unwrap();
    let private_value = private.get_instance::<A>().unwrap();
    assert!(Arc::ptr_eq(&public_value, &private_value));
    assert_eq!(private.parent().map(|p| p.id()), Some(injector.id()));
}

#[test]
fn test_private_injector_is_built_exactly_once() {
    struct TwoKeys {
        builds: Arc<AtomicUsize>,
    }

    impl PrivateModuleConfig for TwoKeys {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<A>().to_provider(|_| Ok(A(1)));
            binder.bind::<B>().to_provider(|_| Ok(B("b".to_string())));
            let builds = self.builds.clone();
            binder.request_injection(move |_| {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            binder.expose::<A>()?;
            binder.expose::<B>()?;
            Ok(())
        }
    }

    let builds = Arc::new(AtomicUsize::new(0));
    let module = PrivateModule::new(TwoKeys {
        builds: builds.clone(),
    });
    let injector = Injector::create(&[&module]).unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    for _ in 0..5 {
        injector.get_instance::<A>().unwrap();
        injector.get_instance::<B>().unwrap();
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unbound_exposure_is_reported_once() {
    struct ExposesC;

    impl PrivateModuleConfig for ExposesC {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<A>().to_instance(A(42));
            binder.bind::<B>().to_instance(B("x".to_string()));
            binder.expose::<A>()?;
            binder.expose::<C>()?;
            Ok(())
        }
    }

    let error = Injector::create(&[&PrivateModule::new(ExposesC)]).unwrap_err();
    assert_eq!(error.messages().len(), 1, "{error}");

    let message = &error.messages()[0];
    assert!(message.text().starts_with("Could not expose() at"));
    assert!(message.text().contains("must be explicitly bound"));
    assert!(message.text().contains(std::any::type_name::<C>()));
    assert!(message
        .source()
        .to_string()
        .contains("private_module_integration_tests.rs"));
}

#[test]
fn test_unbound_exposure_does_not_block_valid_forwarding() {
    struct ExposesC;

    impl PrivateModuleConfig for ExposesC {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<A>().to_instance(A(42));
            binder.expose::<C>()?;
            binder.expose::<A>()?;
            Ok(())
        }
    }

    let mut binder = Binder::new(Stage::Development);
    PrivateModule::new(ExposesC).configure(&mut binder).unwrap();

    let keys = bound_keys(binder.elements());
    assert!(keys.contains(&&Key::of::<A>()));
    assert!(!keys.contains(&&Key::of::<C>()));
    assert_eq!(
        binder.elements().iter().filter(|e| e.is_message()).count(),
        1
    );
}

#[test]
fn test_qualifier_is_attached_once() {
    struct Annotated {
        second: Arc<Mutex<Option<PrivateModuleError>>>,
    }

    impl PrivateModuleConfig for Annotated {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<u32>().annotated_with::<Primary>().to_instance(7);
            let exposed = binder.expose::<u32>()?;
            exposed.annotated_with::<Primary>()?;
            *self.second.lock().unwrap() = exposed.annotated_with::<Secondary>().err();
            Ok(())
        }
    }

    let second = Arc::new(Mutex::new(None));
    let module = PrivateModule::new(Annotated {
        second: second.clone(),
    });
    let injector = Injector::create(&[&module]).unwrap();

    assert!(matches!(
        *second.lock().unwrap(),
        Some(PrivateModuleError::AlreadyAnnotated { .. })
    ));
    assert_eq!(*injector.get::<u32>(&Key::marked::<u32, Primary>()).unwrap(), 7);
    assert!(!injector.can_resolve(&Key::marked::<u32, Secondary>()));
}

#[test]
fn test_exposure_is_frozen_after_configuration() {
    struct KeepsHandle {
        handle: Arc<Mutex<Option<ExposedKeyBuilder>>>,
    }

    impl PrivateModuleConfig for KeepsHandle {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<u32>().named("port").to_instance(8080);
            let exposed = binder.expose::<u32>()?;
            exposed.named("port")?;
            *self.handle.lock().unwrap() = Some(exposed);
            Ok(())
        }
    }

    let handle = Arc::new(Mutex::new(None));
    let injector = Injector::create(&[&PrivateModule::new(KeepsHandle {
        handle: handle.clone(),
    })])
    .unwrap();
    assert_eq!(*injector.get_named::<u32>("port").unwrap(), 8080);

    let exposed = handle.lock().unwrap().take().unwrap();
    assert!(matches!(
        exposed.named("other"),
        Err(PrivateModuleError::ExposureFinalized { .. })
    ));
    assert_eq!(exposed.key(), Key::named::<u32>("port"));
}

#[test]
fn test_expose_outside_configuration_is_not_ready() {
    let module = PrivateModule::new(AnswerModule::new());
    assert!(matches!(
        module.expose::<A>(),
        Err(PrivateModuleError::NotReady { .. })
    ));

    Injector::create(&[&module]).unwrap();
    assert!(matches!(
        module.expose_key(Key::of::<A>()),
        Err(PrivateModuleError::NotReady { .. })
    ));
}

struct SelfInstalling {
    me: Weak<PrivateModule<SelfInstalling>>,
}

impl PrivateModuleConfig for SelfInstalling {
    fn configure_private_bindings(
        &self,
        binder: &mut PrivateBinder<'_>,
    ) -> Result<(), CoreError> {
        binder.bind::<A>().to_instance(A(1));
        if let Some(me) = self.me.upgrade() {
            binder.install(&*me);
        }
        binder.expose::<A>()?;
        Ok(())
    }
}

#[test]
fn test_installing_itself_is_rejected() {
    let module = Arc::new_cyclic(|me| PrivateModule::new(SelfInstalling { me: me.clone() }));

    let error = Injector::create(&[&module]).unwrap_err();
    assert_eq!(error.messages().len(), 1, "{error}");
    assert!(error.messages()[0].text().contains("Re-entry is not allowed"));
    assert_eq!(module.phase(), PassPhase::Idle);
}

struct ConfiguresItself {
    me: Weak<PrivateModule<ConfiguresItself>>,
    nested: Arc<Mutex<Option<String>>>,
}

impl PrivateModuleConfig for ConfiguresItself {
    fn configure_private_bindings(
        &self,
        binder: &mut PrivateBinder<'_>,
    ) -> Result<(), CoreError> {
        if let Some(me) = self.me.upgrade() {
            if let Err(error) = me.configure(binder.binder()) {
                *self.nested.lock().unwrap() = Some(error.to_string());
            }
        }
        Ok(())
    }
}

#[test]
fn test_nested_configure_fails_and_clears_state() {
    let nested = Arc::new(Mutex::new(None));
    let module = Arc::new_cyclic(|me| {
        PrivateModule::new(ConfiguresItself {
            me: me.clone(),
            nested: nested.clone(),
        })
    });

    let error = Injector::create(&[&module]).unwrap_err();
    assert!(error.to_string().contains("Re-entry is not allowed"));
    assert!(nested
        .lock()
        .unwrap()
        .as_deref()
        .unwrap_or_default()
        .contains("Re-entry is not allowed"));

    assert_eq!(module.phase(), PassPhase::Idle);
    assert!(module.expose::<A>().is_err());
    assert!(module.private_injector().is_none());
}

struct ReportsThenReenters {
    me: Weak<PrivateModule<ReportsThenReenters>>,
}

impl PrivateModuleConfig for ReportsThenReenters {
    fn configure_private_bindings(
        &self,
        binder: &mut PrivateBinder<'_>,
    ) -> Result<(), CoreError> {
        binder.add_error("pricing table is missing");
        if let Some(me) = self.me.upgrade() {
            let _ = me.configure(binder.binder());
        }
        Ok(())
    }
}

#[test]
fn test_private_errors_are_kept_when_the_pass_is_aborted() {
    let module = Arc::new_cyclic(|me| PrivateModule::new(ReportsThenReenters { me: me.clone() }));

    let error = Injector::create(&[&module]).unwrap_err();
    let texts: Vec<&str> = error.messages().iter().map(|m| m.text()).collect();
    assert_eq!(texts.len(), 2, "{error}");
    assert!(texts[0].contains("pricing table is missing"));
    assert!(texts[1].contains("Re-entry is not allowed"));
    assert_eq!(module.phase(), PassPhase::Idle);
}

struct ExposesThroughHandle {
    me: Weak<PrivateModule<ExposesThroughHandle>>,
}

impl PrivateModuleConfig for ExposesThroughHandle {
    fn configure_private_bindings(
        &self,
        binder: &mut PrivateBinder<'_>,
    ) -> Result<(), CoreError> {
        binder.bind::<A>().to_instance(A(5));
        if let Some(me) = self.me.upgrade() {
            me.expose::<A>()?;
        }
        Ok(())
    }
}

#[test]
fn test_module_handle_exposes_during_configuration() {
    let module = Arc::new_cyclic(|me| PrivateModule::new(ExposesThroughHandle { me: me.clone() }));
    let injector = Injector::create(&[&module]).unwrap();
    assert_eq!(*injector.get_instance::<A>().unwrap(), A(5));
}

#[test]
fn test_exposed_provider_methods_are_forwarded() {
    struct WithProviders;

    impl PrivateModuleConfig for WithProviders {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<u32>().to_instance(21);
            Ok(())
        }

        fn provider_methods(&self) -> Vec<ProviderMethod> {
            vec![
                ProviderMethod::new(|injector| Ok(A(*injector.get_instance::<u32>()? * 2)))
                    .singleton()
                    .exposed(),
                ProviderMethod::new(|_| Ok(B("internal".to_string()))),
                ProviderMethod::new(|_| Ok(7u8)).named("retries").exposed(),
            ]
        }
    }

    let module = PrivateModule::new(WithProviders);
    let injector = Injector::create(&[&module]).unwrap();

    assert_eq!(*injector.get_instance::<A>().unwrap(), A(42));
    assert_eq!(*injector.get_named::<u8>("retries").unwrap(), 7);
    assert!(injector.get_instance::<B>().is_err());
    assert!(injector.get_instance::<u32>().is_err());
    assert!(module.private_injector().unwrap().get_instance::<B>().is_ok());
}

#[test]
fn test_duplicate_exposure_is_reported() {
    struct ExposesTwice;

    impl PrivateModuleConfig for ExposesTwice {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<A>().to_instance(A(1));
            binder.expose::<A>()?;
            binder.expose::<A>()?;
            Ok(())
        }
    }

    let error = Injector::create(&[&PrivateModule::new(ExposesTwice)]).unwrap_err();
    assert_eq!(error.messages().len(), 1);
    assert!(error.messages()[0].text().contains("already exposed"));
}

#[derive(Debug)]
struct E(u32);

#[derive(Debug)]
struct D(u32);

struct DependsOnPublic;

impl PrivateModuleConfig for DependsOnPublic {
    fn configure_private_bindings(
        &self,
        binder: &mut PrivateBinder<'_>,
    ) -> Result<(), CoreError> {
        binder
            .bind::<D>()
            .eager_singleton()
            .to_provider(|injector| Ok(D(injector.get_instance::<E>()?.0 + 1)));
        binder.expose::<D>()?;
        Ok(())
    }
}

fn eager_public_module(created: Arc<AtomicUsize>) -> impl Module {
    module_fn(move |binder| {
        let created = created.clone();
        binder.bind::<E>().eager_singleton().to_provider(move |_| {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(E(10))
        });
        Ok(())
    })
}

#[test]
fn test_private_provider_depends_on_public_eager_singleton() {
    init_tracing();

    for private_first in [true, false] {
        let created = Arc::new(AtomicUsize::new(0));
        let public = eager_public_module(created.clone());
        let private = PrivateModule::new(DependsOnPublic);

        let modules: [&dyn Module; 2] = if private_first {
            [&private, &public]
        } else {
            [&public, &private]
        };
        let injector = Injector::create(&modules).unwrap();

        assert_eq!(injector.get_instance::<D>().unwrap().0, 11);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(
            &injector.get_instance::<E>().unwrap(),
            &private.private_injector().unwrap().get_instance::<E>().unwrap()
        ));
    }
}

#[test]
fn test_zero_exposures_still_build_private_injector() {
    struct SideEffectOnly {
        ran: Arc<AtomicUsize>,
    }

    impl PrivateModuleConfig for SideEffectOnly {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<A>().to_instance(A(3));
            let ran = self.ran.clone();
            binder.request_injection(move |injector| {
                injector.get_instance::<A>()?;
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        }
    }

    let ran = Arc::new(AtomicUsize::new(0));
    let module = PrivateModule::new(SideEffectOnly { ran: ran.clone() });
    let injector = Injector::create(&[&module]).unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(injector.binding_keys().len(), 1);
    assert!(injector.get_instance::<A>().is_err());
}

#[test]
fn test_module_can_be_installed_in_several_injectors() {
    let module = PrivateModule::new(AnswerModule::new());

    let first = Injector::create(&[&module]).unwrap();
    let first_private = module.private_injector().unwrap();
    let second = Injector::create(&[&module]).unwrap();
    let second_private = module.private_injector().unwrap();

    assert_ne!(first_private.id(), second_private.id());
    assert_eq!(module.inner().builds.load(Ordering::SeqCst), 2);
    assert!(!Arc::ptr_eq(
        &first.get_instance::<A>().unwrap(),
        &second.get_instance::<A>().unwrap()
    ));
}

#[test]
fn test_private_binding_errors_fail_public_creation() {
    struct Broken;

    impl PrivateModuleConfig for Broken {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder.bind::<A>().to_instance(A(1));
            binder.add_error("tax table missing");
            binder.expose::<A>()?;
            Ok(())
        }
    }

    let error = Injector::create(&[&PrivateModule::new(Broken)]).unwrap_err();
    assert_eq!(error.messages().len(), 1);
    assert_eq!(error.messages()[0].text(), "tax table missing");
}

#[test]
fn test_private_eager_failure_surfaces_through_gate() {
    struct FailsEagerly;

    impl PrivateModuleConfig for FailsEagerly {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            binder
                .bind::<A>()
                .eager_singleton()
                .to_provider(|_| Err(CoreError::provider("rates service down")));
            binder.expose::<A>()?;
            Ok(())
        }
    }

    let error = Injector::create(&[&PrivateModule::new(FailsEagerly)]).unwrap_err();
    assert_eq!(error.messages().len(), 1);
    assert!(error.to_string().contains("rates service down"));
}

#[test]
fn test_private_bindings_see_public_bindings() {
    struct UsesParent;

    impl PrivateModuleConfig for UsesParent {
        fn configure_private_bindings(
            &self,
            binder: &mut PrivateBinder<'_>,
        ) -> Result<(), CoreError> {
            let base = binder.get_provider::<u32>(Key::named::<u32>("base"));
            binder
                .bind::<A>()
                .to_provider(move |_| Ok(A(*base.get()? + 1)));
            binder.expose::<A>()?;
            Ok(())
        }
    }

    let public = module_fn(|binder| {
        binder.bind_constant("base", 99u32);
        Ok(())
    });
    let injector = Injector::create(&[&public, &PrivateModule::new(UsesParent)]).unwrap();
    assert_eq!(*injector.get_instance::<A>().unwrap(), A(100));
}

#[test]
fn test_tool_stage_records_without_building() {
    let module = Arc::new(PrivateModule::new(AnswerModule::new()));
    let injector = Injector::builder()
        .stage(Stage::Tool)
        .shared_module(module.clone())
        .build()
        .unwrap();

    assert!(injector.has_binding(&Key::of::<A>()));
    assert!(!injector.has_binding(&Key::of::<B>()));
    assert!(module.private_injector().is_none());
    assert_eq!(module.inner().builds.load(Ordering::SeqCst), 0);
}
