//! Benchmarks for state merging and report assembly.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rig_research_graph::pregel::{StateUpdate, WorkflowState};
use rig_research_graph::research::{
    InterviewState, InterviewUpdate, ReportParts, ResearchGraphState, ResearchGraphUpdate,
};
use rig_research_graph::research::Analyst;
use rig_research_graph::state::{buffer_string, Message};

fn section_updates(count: usize) -> Vec<ResearchGraphUpdate> {
    (0..count)
        .map(|i| ResearchGraphUpdate::sections(vec![format!("## Section {i}\nBody of section {i}")]))
        .collect()
}

fn benchmark_section_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("section_fan_in");
    let state = ResearchGraphState::new("Rust async runtimes", 16);

    for branches in [2usize, 8, 32] {
        let updates = section_updates(branches);
        group.bench_with_input(BenchmarkId::from_parameter(branches), &updates, |b, updates| {
            b.iter(|| state.apply_updates(black_box(updates.clone())))
        });
    }
    group.finish();
}

fn benchmark_interview_merge(c: &mut Criterion) {
    let state = InterviewState::new(
        Analyst::new("Ada", "Systems engineer", "ACME", "latency"),
        vec![Message::user("So you said you were writing an article on Rust?")],
    );

    c.bench_function("interview_turn_merge", |b| {
        b.iter(|| {
            let mut update = InterviewUpdate::context("<Document href=\"a\"/>\nweb\n</Document>");
            update.merge(InterviewUpdate::context("<Document source=\"b\" page=\"\"/>\nwiki\n</Document>"));
            update.merge(InterviewUpdate::message(Message::assistant("answer").with_name("expert")));
            state.apply_update(black_box(update))
        })
    });
}

fn benchmark_transcript(c: &mut Criterion) {
    let messages: Vec<Message> = (0..40)
        .map(|i| {
            if i % 2 == 0 {
                Message::assistant(format!("question {i}"))
            } else {
                Message::assistant(format!("answer {i}")).with_name("expert")
            }
        })
        .collect();

    c.bench_function("buffer_string_40_turns", |b| {
        b.iter(|| buffer_string(black_box(&messages)))
    });
}

fn benchmark_report_assembly(c: &mut Criterion) {
    let body: String = (0..50).map(|i| format!("Paragraph {i} [1].\n")).collect();
    let content = format!("## Insights\n{body}\n## Sources\n[1] https://example.com");

    c.bench_function("report_split_assemble", |b| {
        b.iter(|| ReportParts::split(black_box(&content)).assemble("Intro", "End"))
    });
}

criterion_group!(
    benches,
    benchmark_section_fan_in,
    benchmark_interview_merge,
    benchmark_transcript,
    benchmark_report_assembly
);
criterion_main!(benches);
