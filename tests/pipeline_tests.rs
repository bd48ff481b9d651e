use std::sync::Arc;

use milestone::generator::ScriptedGenerator;
use milestone::models::{NodeRef, TaskCoord};
use milestone::normalize::{coerce_completed, normalize, plan_from_value};
use milestone::parser::{fallback_plan, markdown, repair};
use milestone::service::GenerateRequest;
use milestone::store::{JsonFileStore, MemoryStore, PlanKey, PlanStore};
use milestone::{interpret, Core, PlanSource};
use pretty_assertions::assert_eq;
use serde_json::json;

const SPANISH_PLAN: &str = r#"```json
{
  "months": [
    {
      "title": "Month 1: Foundations",
      "weeks": [
        {
          "title": "Week 1: Greetings",
          "days": [
            {"title": "Monday", "tasks": [{"title": "Learn hola and adios", "completed": false}]},
            {"title": "Tuesday", "tasks": [{"title": "Numbers 1-10", "completed": "false"}]}
          ]
        }
      ]
    }
  ]
}
```"#;

fn every_node_is_complete(plan: &milestone::Plan) -> bool {
    plan.months.iter().all(|m| {
        !m.id.is_empty()
            && !m.title.trim().is_empty()
            && m.weeks.iter().all(|w| {
                !w.id.is_empty()
                    && !w.title.trim().is_empty()
                    && w.days.iter().all(|d| {
                        !d.id.is_empty()
                            && !d.title.trim().is_empty()
                            && d.tasks
                                .iter()
                                .all(|t| !t.id.is_empty() && !t.title.trim().is_empty())
                    })
            })
    })
}

#[test]
fn test_normalize_idempotent_on_every_path() {
    let plans = [
        interpret(SPANISH_PLAN, "Learn Spanish").plan,
        interpret(r#"{"weeks": [{"days": [{}]}]}"#, "G").plan,
        interpret("## Month 1\n### Week 1\n- a", "G").plan,
        interpret("nothing useful", "G").plan,
        plan_from_value(&json!({"months": [{"weeks": [{"days": [{"tasks": [{}]}]}]}]}), "G"),
    ];

    for plan in plans {
        assert!(every_node_is_complete(&plan));
        assert_eq!(normalize(plan.clone()), plan);
    }
}

#[test]
fn test_repair_total_over_garbage() {
    for candidate in [
        json!({}),
        json!(null),
        json!([{"weeks": []}]),
        json!({"weeks": null}),
        json!({"a": {"b": {"c": [1, {"d": null}]}}}),
        json!(true),
    ] {
        let plan = repair(&candidate, "G");
        assert!(plan.months.is_empty());
        assert_eq!(plan.goal, "G");
    }
}

#[test]
fn test_empty_fragment_fills_calendar() {
    let plan = repair(&json!({"weeks": []}), "Learn chess");

    assert_eq!(plan.months.len(), 3);
    for month in &plan.months {
        assert_eq!(month.weeks.len(), 4);
        for week in &month.weeks {
            assert_eq!(week.days.len(), 7);
            assert!(week.days.iter().all(|d| !d.tasks.is_empty()));
        }
    }
}

#[test]
fn test_markdown_grain() {
    let plan = markdown::parse(
        "# Goal: X\n## Month 1: A\n### Week 1: B\n- Day 1: t1\n- Day 2: t2",
        "G",
    )
    .unwrap();

    assert_eq!(plan.goal, "G");
    assert_eq!(plan.months.len(), 1);
    assert_eq!(plan.months[0].title, "A");
    assert_eq!(plan.months[0].weeks.len(), 1);
    assert_eq!(plan.months[0].weeks[0].title, "B");
    assert_eq!(plan.tasks().count(), 2);
}

#[test]
fn test_markdown_without_months() {
    assert!(markdown::parse("Here is some advice:\n- sleep\n- eat well", "G").is_none());
}

#[test]
fn test_completion_coercion() {
    let plan = plan_from_value(
        &json!({"months": [{"weeks": [{"days": [{"tasks": [
            {"title": "a", "completed": "true"},
            {"title": "b", "completed": "false"},
            {"title": "c", "completed": 1},
            {"title": "d", "completed": 0},
            {"title": "e", "completed": null},
            {"title": "f"}
        ]}]}]}]}),
        "G",
    );

    let flags: Vec<bool> = plan.tasks().map(|t| t.completed).collect();
    assert_eq!(flags, vec![true, false, true, false, false, false]);
    assert!(coerce_completed(&json!("Yes")));
}

#[test]
fn test_backfill_stable_under_renormalization() {
    let value = json!({"months": [{"title": "", "weeks": [{"days": [{"tasks": [{"title": "x"}]}]}]}]});
    let first = plan_from_value(&value, "G");
    let second = normalize(first.clone());

    assert_eq!(first.months[0].id, second.months[0].id);
    assert_eq!(first.months[0].title, "Month 1");
    assert_eq!(second.months[0].title, "Month 1");

    let stored = serde_json::to_value(&first).unwrap();
    assert_eq!(plan_from_value(&stored, "G"), first);
}

#[test]
fn test_toggle_round_trip_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    let key = PlanKey::for_goal("ana", "Run a marathon");

    let plan = fallback_plan("Run a marathon");
    store.save(&key, &plan).unwrap();

    let coord = TaskCoord {
        month: NodeRef::Id("month-1".to_string()),
        week: NodeRef::Index(2),
        day: NodeRef::Id("day-1-2-3".to_string()),
        task: NodeRef::Index(1),
    };
    let toggled = store.load(&key).unwrap().unwrap().toggled(&coord).unwrap();
    store.save(&key, &toggled).unwrap();

    let reloaded = store.load(&key).unwrap().unwrap();
    assert!(reloaded.months[1].weeks[2].days[3].tasks[1].completed);
    assert_eq!(reloaded.progress().completed, 1);
}

#[tokio::test]
async fn test_learn_spanish_json_path() {
    let generator = ScriptedGenerator::new().reply("Hi!").reply(SPANISH_PLAN);
    let core = Core::new(Arc::new(generator), Arc::new(MemoryStore::new()));

    let outcome = core
        .generate_plan(
            "ana",
            GenerateRequest {
                goal: "Learn Spanish".to_string(),
                format: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.source, PlanSource::Json);
    assert!(outcome.notice.is_none());

    let plan = &outcome.plan;
    assert_eq!(plan.goal, "Learn Spanish");
    assert_eq!(plan.months[0].title, "Month 1: Foundations");
    assert_eq!(plan.months[0].weeks[0].days[1].title, "Tuesday");
    assert!(every_node_is_complete(plan));
    assert!(plan.tasks().all(|t| !t.completed));

    let stored = core
        .get_plan(&PlanKey::for_goal("ana", "Learn Spanish"))
        .await
        .unwrap();
    assert_eq!(&stored, plan);
}

#[tokio::test]
async fn test_run_a_marathon_generator_failure() {
    let generator = ScriptedGenerator::new().fail("connection reset");
    let core = Core::new(Arc::new(generator), Arc::new(MemoryStore::new()));

    let outcome = core
        .generate_plan(
            "bo",
            GenerateRequest {
                goal: "Run a marathon".to_string(),
                format: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.source, PlanSource::Fallback);
    assert!(outcome.notice.is_some());
    assert_eq!(outcome.plan, fallback_plan("Run a marathon"));
    assert_eq!(outcome.plan.months.len(), 3);
    assert_eq!(outcome.plan.day_count(), 84);
    assert!(outcome.plan.tasks().all(|t| !t.completed));
}
