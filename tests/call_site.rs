use solvra_interp::ir::{CallSite, CallType, Instr, Operand, ScopeBuilder};
use solvra_interp::runtime::{ClassId, Visibility};
use solvra_interp::{Runtime, RuntimeConfig, ThreadContext, Value, run_script};

fn speak(text: &str) -> std::sync::Arc<solvra_interp::ir::Scope> {
    let mut method = ScopeBuilder::method("speak", "animal.rb", 1);
    method.method_prologue().method_epilogue(Operand::str(text));
    method.build()
}

#[test]
fn cache_hits_until_the_class_changes() {
    let runtime = Runtime::new(RuntimeConfig::default());
    let animal = runtime.define_class("Animal", ClassId::OBJECT);
    let dog = runtime.define_class("Dog", animal);
    let first = runtime.define_method(animal, "speak", speak("..."), Visibility::Public);

    let site = CallSite::new("speak", CallType::Normal);
    let resolved = site.resolve(&runtime, dog).expect("inherited");
    assert_eq!(resolved.serial, first.serial);
    site.resolve(&runtime, dog).expect("cached");
    assert_eq!(site.stats(), (1, 1));

    let second = runtime.define_method(animal, "speak", speak("woof"), Visibility::Public);
    let resolved = site.resolve(&runtime, dog).expect("redefined");
    assert_eq!(resolved.serial, second.serial);
    assert_eq!(site.stats(), (1, 2));

    // A different receiver class never reuses the entry.
    site.resolve(&runtime, animal).expect("animal");
    assert_eq!(site.stats(), (1, 3));
}

#[test]
fn interpreted_calls_share_the_instruction_cache() {
    // 3.times { |i| i + 1 }
    let mut s = ScopeBuilder::script("times.rb");
    let mut block = ScopeBuilder::closure(&s, 1);
    let i = block.declare_local("i");
    block.emit(Instr::RecvPreReqdArg {
        result: i.clone().into(),
        index: 0,
    });
    let next = block.temp();
    block.call(Some(next.into()), "+", i.into(), vec![Operand::int(1)]);
    block.ret(next.into());
    let block = block.build();

    s.method_prologue();
    let closure = s.temp();
    s.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: std::sync::Arc::clone(&block),
        lambda: false,
    });
    s.emit(Instr::call(
        None,
        "times",
        CallType::Normal,
        Operand::int(3),
        Vec::new(),
        Some(closure.into()),
    ));
    s.method_epilogue(Operand::nil());

    let mut ctx = ThreadContext::new(Runtime::new(RuntimeConfig::default()));
    let outcome = run_script(&mut ctx, &s.build());
    assert_eq!(outcome.expect("times"), Value::Nil);

    let prepared = block.instrs_for_interpretation().expect("prepared");
    let stats = prepared
        .instrs()
        .iter()
        .find_map(|instr| match instr {
            Instr::Call(call) => Some(call.site.stats()),
            _ => None,
        })
        .expect("call instruction");
    assert_eq!(stats, (2, 1));
}
