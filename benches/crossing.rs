use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jbridge::runtime::{Env, JValue, Vm};
use jbridge::NativeFn;

fn sandbox() -> Vm {
    let vm = Vm::new().unwrap();
    jbridge::sandbox::install_wrapper_classes(&vm).unwrap();
    vm
}

fn bench_round_trip(c: &mut Criterion) {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let managed = jbridge::java_value(&*env, NativeFn::from_fn(|x: i32| x % 2 == 0)).unwrap();
    let is_even = jbridge::native_value::<i32, bool>(&*env, managed).unwrap();
    env.delete_local_ref(managed);

    c.bench_function("round_trip_int_predicate", |b| {
        b.iter(|| is_even.call(black_box(42)).unwrap());
    });

    let managed = jbridge::java_value(&*env, NativeFn::from_fn(|s: String| s.to_uppercase())).unwrap();
    let upper = jbridge::native_value::<String, String>(&*env, managed).unwrap();
    env.delete_local_ref(managed);

    c.bench_function("round_trip_string_function", |b| {
        b.iter(|| upper.call(black_box("payload".to_string())).unwrap());
    });
}

fn bench_managed_entry(c: &mut Criterion) {
    let vm = sandbox();
    let env = vm.attach_current_thread();

    let managed = jbridge::java_value(&*env, NativeFn::from_fn(|x: i64| x.wrapping_mul(2) > 0)).unwrap();
    let interface = env.find_class("java/util/function/LongPredicate");
    let test = env.get_method_id(interface, "test", "(J)Z");

    c.bench_function("managed_calls_native_long_predicate", |b| {
        b.iter(|| env.call_boolean_method(managed, test, &[JValue::Long(black_box(21))]));
    });
}

fn bench_wrap(c: &mut Criterion) {
    let vm = sandbox();
    let env = vm.attach_current_thread();
    let function = NativeFn::from_fn(|x: f64| x.to_string());

    c.bench_function("wrap_and_release", |b| {
        b.iter(|| {
            let managed = jbridge::java_value(&*env, black_box(function.clone())).unwrap();
            env.delete_local_ref(managed);
        });
    });
}

criterion_group!(benches, bench_round_trip, bench_managed_entry, bench_wrap);
criterion_main!(benches);
