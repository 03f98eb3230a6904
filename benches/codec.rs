//! Performance benchmarks for commandbridge
//!
//! Run with: cargo bench

use commandbridge::host::memory::{MemoryNetwork, MemoryPresence, RecordingExecutor, StaticAccess};
use commandbridge::placeholder::resolve;
use commandbridge::{
    Actor, BridgeConfig, CommandSpec, CommandStep, Dispatcher, ExecutorKind, HostServices,
    Invocation, RelayFrame, RelayHandler, RelayMessage, SenderContext,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use uuid::Uuid;

fn bench_placeholders(c: &mut Criterion) {
    let actor = Actor::new(Uuid::new_v4(), "Alice");
    let args: Vec<String> = ["diamond_sword", "1", "sharpness"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    c.bench_function("resolve (4 tokens)", |b| {
        b.iter(|| resolve("give %player% %arg[0]% %arg[1]% # %args%", Some(&actor), &args));
    });

    c.bench_function("resolve (no tokens)", |b| {
        b.iter(|| resolve("broadcast The server restarts soon", Some(&actor), &args));
    });
}

fn bench_codec(c: &mut Criterion) {
    let message = RelayMessage::new("lobby-2", ExecutorKind::System, "broadcast Restart in 5 minutes");

    c.bench_function("RelayMessage encode", |b| {
        b.iter(|| message.encode().unwrap());
    });

    let bytes = message.encode().unwrap();
    c.bench_function("RelayFrame decode", |b| {
        b.iter(|| RelayFrame::decode(&bytes).unwrap());
    });
}

fn bench_inbound(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let handler = RelayHandler::new(
        &BridgeConfig::for_server("lobby-2"),
        Arc::new(RecordingExecutor::new()),
    );
    let sender = SenderContext {
        origin: "proxy-1".to_string(),
        actor: None,
    };
    let filtered = RelayMessage::new("lobby-9", ExecutorKind::System, "stop")
        .encode()
        .unwrap();

    c.bench_function("RelayHandler filter miss", |b| {
        b.to_async(&rt)
            .iter(|| async { handler.handle("commandbridge:main", &sender, &filtered).await });
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let network = MemoryNetwork::new();
    network.endpoint("lobby-1");
    let host = HostServices {
        presence: Arc::new(MemoryPresence::default()),
        transport: network.endpoint("proxy-1"),
        executor: Arc::new(RecordingExecutor::new()),
        access: Arc::new(StaticAccess::allow_all()),
    };
    let dispatcher = Dispatcher::with_runtime(BridgeConfig::for_server("proxy-1"), host, rt.handle().clone());
    let spec = Arc::new(
        CommandSpec::new(
            "announce",
            vec![
                CommandStep::new("say %args%")
                    .with_targets(["lobby-1"])
                    .with_executor(ExecutorKind::System),
                CommandStep::new("log %args%").with_executor(ExecutorKind::System),
            ],
        )
        .allow_console(),
    );

    c.bench_function("Dispatcher dispatch (2 steps)", |b| {
        b.to_async(&rt).iter(|| async {
            dispatcher
                .dispatch(spec.clone(), Invocation::from_raw(None, "hello fleet"))
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_placeholders,
    bench_codec,
    bench_inbound,
    bench_dispatch,
);
criterion_main!(benches);
