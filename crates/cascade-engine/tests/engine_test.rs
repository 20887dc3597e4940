//! End-to-end scheduler tests against a small block library.

use std::sync::Arc;

use cascade_config::{JobDef, StepDef};
use cascade_engine::{ChannelHooks, Job, JobEvent, JobState, NodeStatus};
use cascade_registry::{
  BlockDescriptor, BlockError, BlockFn, BlockRegistry, Globals, ParamType,
};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

fn registry() -> Arc<BlockRegistry> {
  let mut registry = BlockRegistry::new();

  registry
    .register(
      BlockDescriptor::new("math", "sum")
        .keyword("value1", ParamType::Number)
        .keyword("value2", ParamType::Number),
      BlockFn::sync(|args, _| {
        let value1 = args.value("value1")?;
        let value2 = args.value("value2")?;
        match (value1.as_i64(), value2.as_i64()) {
          (Some(a), Some(b)) => Ok(json!(a + b)),
          _ => {
            let a = value1.as_f64().unwrap_or_default();
            let b = value2.as_f64().unwrap_or_default();
            Ok(json!(a + b))
          }
        }
      }),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("math", "positive").keyword("value", ParamType::Number),
      BlockFn::sync(|args, _| {
        let value = args.f64("value")?;
        if value <= 0.0 {
          return Err(BlockError::invalid_argument("value must be positive"));
        }
        Ok(json!(value))
      }),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("text", "join")
        .keyword("left", ParamType::String)
        .keyword("right", ParamType::String)
        .with_default("separator", ParamType::String, " "),
      BlockFn::sync(|args, _| {
        Ok(json!(format!(
          "{}{}{}",
          args.string("left")?,
          args.string("separator")?,
          args.string("right")?
        )))
      }),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("variable", "set")
        .keyword("name", ParamType::String)
        .optional("value", ParamType::Any),
      BlockFn::sync(|args, ctx| {
        let name = args.string("name")?;
        let value = args.value("value").unwrap_or(Value::Null);
        ctx.variables.define(name, value);
        Ok(Value::Null)
      }),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("list", "append")
        .keyword("list", ParamType::Variable)
        .keyword("value", ParamType::Any),
      BlockFn::sync(|args, _| {
        let cell = args.variable("list")?;
        let value = args.value("value")?;
        cell.update(|current| {
          if let Value::Array(items) = current {
            items.push(value);
          }
        });
        Ok(Value::Null)
      }),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("logic", "noop").no_validate(),
      BlockFn::sync(|_, _| Ok(Value::Null)),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("logic", "fail").no_validate(),
      BlockFn::sync(|_, _| Err(BlockError::failed("boom"))),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("logic", "abort").no_validate(),
      BlockFn::sync(|_, _| Err(BlockError::abort("stop everything"))),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("async", "echo").keyword("value", ParamType::Any),
      BlockFn::async_fn(|args, _| async move { args.value("value") }),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("flow", "branch").no_validate(),
      BlockFn::sync(|_, ctx| {
        ctx.queue.push(
          StepDef::new("list.append")
            .with_parameter("list", "{# trace #}")
            .with_parameter("value", "child-1"),
        );
        ctx.queue.push(
          StepDef::new("list.append")
            .with_parameter("list", "{# trace #}")
            .with_parameter("value", "child-2"),
        );
        Ok(json!("branched"))
      }),
    )
    .unwrap();

  registry
    .register(
      BlockDescriptor::new("store", "write").keyword("value", ParamType::Any),
      BlockFn::sync(|args, ctx| {
        let store = ctx
          .globals
          .get::<std::sync::Mutex<Vec<Value>>>("store")
          .ok_or_else(|| BlockError::failed("no store configured"))?;
        store.lock().unwrap().push(args.value("value")?);
        Ok(Value::Null)
      }),
    )
    .unwrap();

  Arc::new(registry)
}

fn variables(value: Value) -> Map<String, Value> {
  value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn test_empty_job_succeeds() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let mut job = Job::new(registry()).with_hooks(ChannelHooks::new(tx));
  job.run().await;
  assert_eq!(job.state(), JobState::Succeeded);
  assert_eq!(job.succeeded(), Some(true));
  assert!(job.results().is_empty());
  // Only the finish event fires.
  match rx.try_recv().unwrap() {
    JobEvent::JobFinished {
      succeeded,
      failed_path,
    } => {
      assert!(succeeded);
      assert!(failed_path.is_none());
    }
    other => panic!("unexpected event: {:?}", other),
  }
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_sum_with_variable_reference() {
  let mut job = Job::new(registry()).with_variables(variables(json!({ "count": 3 })));
  let path = job.create_step(
    StepDef::new("math.sum")
      .with_parameter("value1", "{# count #}")
      .with_parameter("value2", 4),
  );
  job.run().await;
  assert_eq!(job.status_of(&path), NodeStatus::Done);
  assert_eq!(job.result_of(&path), Some(&json!(7)));
  assert_eq!(job.succeeded(), Some(true));
}

#[tokio::test]
async fn test_embedded_reference_stringifies() {
  let mut job = Job::new(registry()).with_variables(variables(json!({ "name": 5 })));
  let embedded = job.create_step(
    StepDef::new("async.echo").with_parameter("value", "x = {# name #}"),
  );
  let sole = job.create_step(
    StepDef::new("async.echo").with_parameter("value", "{# name #}"),
  );
  job.run().await;
  // Embedded in text the reference stringifies; alone it keeps its type.
  assert_eq!(job.result_of(&embedded), Some(&json!("x = 5")));
  assert_eq!(job.result_of(&sole), Some(&json!(5)));
}

#[tokio::test]
async fn test_step_result_reference() {
  let mut job = Job::new(registry());
  job.create_step(
    StepDef::new("math.sum")
      .with_id("first")
      .with_parameter("value1", 3)
      .with_parameter("value2", 4),
  );
  let second = job.create_step(
    StepDef::new("math.sum")
      .with_parameter("value1", "{: first :}")
      .with_parameter("value2", 10),
  );
  job.run().await;
  assert_eq!(job.result_of(&second), Some(&json!(17)));
}

#[tokio::test]
async fn test_failure_skips_later_nodes_except_forced() {
  let mut job = Job::new(registry());
  let ok = job.create_step(StepDef::new("logic.noop"));
  let failing = job.create_step(StepDef::new("logic.fail"));
  let skipped = job.create_step(StepDef::new("logic.noop"));
  let forced = job.create_step(StepDef::new("logic.noop").forced());
  job.run().await;

  assert_eq!(job.status_of(&ok), NodeStatus::Done);
  assert_eq!(job.status_of(&failing), NodeStatus::UnhandledException);
  assert_eq!(job.status_of(&skipped), NodeStatus::Skipped);
  assert_eq!(job.status_of(&forced), NodeStatus::Done);
  assert_eq!(job.state(), JobState::Failed);
  assert_eq!(job.failed_path(), Some(failing.as_str()));
}

#[tokio::test]
async fn test_missing_block_fails_run() {
  let mut job = Job::new(registry());
  let missing = job.create_step(StepDef::new("ghost.block"));
  let skipped = job.create_step(StepDef::new("logic.noop"));
  job.run().await;
  assert_eq!(job.status_of(&missing), NodeStatus::BlockNotFound);
  assert_eq!(job.status_of(&skipped), NodeStatus::Skipped);
  assert_eq!(job.succeeded(), Some(false));
}

#[tokio::test]
async fn test_false_condition_does_not_fail_run() {
  let mut job = Job::new(registry()).with_variables(variables(json!({ "flag": false })));
  let gated = job.create_step(StepDef::new("logic.noop").with_condition("{# flag #}"));
  let after = job.create_step(StepDef::new("logic.noop"));
  job.run().await;
  assert_eq!(job.status_of(&gated), NodeStatus::IfConditionFailed);
  assert_eq!(job.status_of(&after), NodeStatus::Done);
  assert_eq!(job.succeeded(), Some(true));
}

#[tokio::test]
async fn test_condition_list_is_anded() {
  let mut job =
    Job::new(registry()).with_variables(variables(json!({ "a": true, "b": false })));
  let path = job.create_step(
    StepDef::new("logic.noop").with_condition(json!(["{# a #}", "{# b #}"])),
  );
  job.run().await;
  assert_eq!(job.status_of(&path), NodeStatus::IfConditionFailed);
}

#[tokio::test]
async fn test_run_is_repeatable() {
  let mut job = Job::new(registry()).with_variables(variables(json!({ "count": 3 })));
  job.create_step(
    StepDef::new("math.sum")
      .with_id("sum")
      .with_parameter("value1", "{# count #}")
      .with_parameter("value2", 4),
  );
  job.create_step(StepDef::new("logic.noop"));

  job.run().await;
  let first_results = job.results().clone();
  let first_statuses = job.statuses().clone();
  let first_state = job.state();

  job.run().await;
  assert_eq!(job.results(), &first_results);
  assert_eq!(job.statuses(), &first_statuses);
  assert_eq!(job.state(), first_state);
}

#[tokio::test]
async fn test_shared_variable_mutation() {
  let mut job =
    Job::new(registry()).with_variables(variables(json!({ "items": ["seed"] })));
  job.create_step(
    StepDef::new("list.append")
      .with_parameter("list", "{# items #}")
      .with_parameter("value", "grown"),
  );
  let read = job.create_step(
    StepDef::new("async.echo").with_parameter("value", "{# items #}"),
  );
  job.run().await;
  assert_eq!(job.result_of(&read), Some(&json!(["seed", "grown"])));
  assert_eq!(
    job.variables().get("items").unwrap().get(),
    json!(["seed", "grown"])
  );
}

#[tokio::test]
async fn test_variable_set_creates_variable() {
  let mut job = Job::new(registry());
  job.create_step(
    StepDef::new("variable.set")
      .with_parameter("name", "greeting")
      .with_parameter("value", "hello"),
  );
  let read = job.create_step(
    StepDef::new("async.echo").with_parameter("value", "{# greeting #}"),
  );
  job.run().await;
  assert_eq!(job.result_of(&read), Some(&json!("hello")));
}

#[tokio::test]
async fn test_abort_is_killed_manually() {
  let mut job = Job::new(registry());
  let abort = job.create_step(StepDef::new("logic.abort"));
  job.run().await;
  assert_eq!(job.status_of(&abort), NodeStatus::KilledManually);
  assert_eq!(job.succeeded(), Some(false));
}

#[tokio::test]
async fn test_invalid_argument_status() {
  let mut job = Job::new(registry());
  let path = job.create_step(StepDef::new("math.positive").with_parameter("value", -2));
  job.run().await;
  assert_eq!(job.status_of(&path), NodeStatus::InvalidArgument);
  assert_eq!(job.succeeded(), Some(false));
}

#[tokio::test]
async fn test_schema_validation_failure() {
  let mut job = Job::new(registry());
  let wrong_type = job.create_step(
    StepDef::new("math.sum")
      .with_parameter("value1", "not a number")
      .with_parameter("value2", 1),
  );
  job.run().await;
  assert_eq!(job.status_of(&wrong_type), NodeStatus::InvalidType);

  let mut job = Job::new(registry());
  let missing = job.create_step(StepDef::new("math.sum").with_parameter("value1", 1));
  job.run().await;
  assert_eq!(job.status_of(&missing), NodeStatus::InvalidType);
}

#[tokio::test]
async fn test_resolution_error_is_node_failure() {
  let mut job = Job::new(registry());
  let path = job.create_step(
    StepDef::new("async.echo").with_parameter("value", "{# missing #}"),
  );
  job.run().await;
  assert_eq!(job.status_of(&path), NodeStatus::UnhandledException);
  assert_eq!(job.succeeded(), Some(false));
}

#[tokio::test]
async fn test_queued_steps_run_as_children() {
  let mut job =
    Job::new(registry()).with_variables(variables(json!({ "trace": [] })));
  job.create_step(
    StepDef::new("list.append")
      .with_parameter("list", "{# trace #}")
      .with_parameter("value", "before"),
  );
  let branch = job.create_step(StepDef::new("flow.branch").with_id("br"));
  job.create_step(
    StepDef::new("list.append")
      .with_parameter("list", "{# trace #}")
      .with_parameter("value", "after"),
  );
  job.run().await;

  assert_eq!(
    job.variables().get("trace").unwrap().get(),
    json!(["before", "child-1", "child-2", "after"])
  );
  assert_eq!(job.result_of(&branch), Some(&json!("branched")));
  assert_eq!(job.status_of("br/1"), NodeStatus::Done);
  assert_eq!(job.status_of("br/2"), NodeStatus::Done);
  assert_eq!(job.succeeded(), Some(true));
}

#[tokio::test]
async fn test_globals_reach_blocks() {
  let mut globals = Globals::new();
  globals.insert("store", std::sync::Mutex::new(Vec::<Value>::new()));
  let mut job = Job::new(registry()).with_globals(globals.clone());
  job.create_step(StepDef::new("store.write").with_parameter("value", 42));
  job.run().await;
  assert_eq!(job.succeeded(), Some(true));
  let store = globals.get::<std::sync::Mutex<Vec<Value>>>("store").unwrap();
  assert_eq!(*store.lock().unwrap(), vec![json!(42)]);
}

#[tokio::test]
async fn test_step_update_events() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let mut job = Job::new(registry()).with_hooks(ChannelHooks::new(tx));
  job.create_step(StepDef::new("logic.noop"));
  job.create_step(StepDef::new("logic.fail"));
  job.run().await;

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  assert_eq!(events.len(), 3);
  assert!(matches!(
    &events[0],
    JobEvent::StepUpdated { status: NodeStatus::Done, .. }
  ));
  assert!(matches!(
    &events[1],
    JobEvent::StepUpdated { status: NodeStatus::UnhandledException, .. }
  ));
  assert!(matches!(
    &events[2],
    JobEvent::JobFinished { succeeded: false, failed_path: Some(path) } if path == "2"
  ));
}

#[tokio::test]
async fn test_job_from_definition() {
  let def: JobDef = serde_json::from_value(json!({
    "name": "welcome",
    "variables": { "count": 3 },
    "local_values": { "who": "alice" },
    "steps": [
      {
        "action": "math.sum",
        "id": "sum",
        "parameters": { "value1": "{# count #}", "value2": 4 }
      },
      {
        "action": "text.join",
        "id": "greet",
        "parameters": { "left": "hello", "right": "{< who >}" },
        "if": "{: sum :}"
      }
    ]
  }))
  .unwrap();
  let mut job = Job::from_def(registry(), def);
  job.run().await;
  assert_eq!(job.result_of("sum"), Some(&json!(7)));
  assert_eq!(job.result_of("greet"), Some(&json!("hello alice")));
  assert_eq!(job.state(), JobState::Succeeded);
}

#[tokio::test]
async fn test_nested_steps_execute_depth_first() {
  let mut job = Job::new(registry()).with_variables(variables(json!({ "trace": [] })));
  let mark = |value: &str| {
    StepDef::new("list.append")
      .with_parameter("list", "{# trace #}")
      .with_parameter("value", value)
  };
  job.create_step(mark("root-1").with_id("a").with_step(mark("a-child")));
  job.create_step(mark("root-2"));
  job.run().await;
  assert_eq!(
    job.variables().get("trace").unwrap().get(),
    json!(["root-1", "a-child", "root-2"])
  );
}
