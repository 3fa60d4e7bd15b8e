mod common;

use common::*;
use ezadmin::codegen::fields::{FieldType, RelationKind, RelationTargetRef};
use ezadmin::codegen::models::{ModelEntry, ModelFile};
use ezadmin::introspect::{BackendKind, ColumnDescriptor};
use ezadmin::{BuildOptions, Error, Orchestrator};
use std::collections::BTreeSet;

fn orchestrator(project: &std::path::Path, connector: MemoryConnector, databases: &[(&str, &str)]) -> Orchestrator {
    Orchestrator::new(project, config_with(databases))
        .unwrap()
        .with_connector(connector)
        .with_migrator(RecordingMigrator::default())
        .with_bootstrap(RecordingBootstrap::default())
}

async fn generate(introspector: MemoryIntrospector) -> ModelFile {
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new().database("memory://db", introspector);
    let orchestrator = orchestrator(project.path(), connector, &[("default", "memory://db")]);
    let (_, file) = orchestrator
        .generate_alias("default", "memory://db", &BTreeSet::new())
        .await
        .unwrap();
    file
}

fn model<'a>(file: &'a ModelFile, name: &str) -> &'a ezadmin::codegen::models::ModelSpec {
    file.models()
        .find(|model| model.name == name)
        .unwrap_or_else(|| panic!("model {} not generated", name))
}

#[tokio::test]
async fn test_customer_order_scenario() {
    let file = generate(shop(BackendKind::PostgreSQL)).await;

    assert_eq!(file.model_names(), vec!["Customer", "CustomerOrder"]);

    let order = model(&file, "CustomerOrder");
    let names: Vec<&str> = order.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["customer", "total"]);

    let customer = &order.fields[0];
    assert_eq!(
        customer.field_type,
        FieldType::Relation {
            kind: RelationKind::ManyToOne,
            target: RelationTargetRef::Declared("Customer".to_string()),
        }
    );
    assert!(!customer.flag("null"));
    assert!(order.fields[1].flag("null"));
    assert!(order.fields[1].flag("blank"));
}

#[tokio::test]
async fn test_unique_relation_becomes_one_to_one() {
    let introspector = MemoryIntrospector::new(BackendKind::PostgreSQL)
        .table(
            "customer",
            MemoryTable::new(vec![ColumnDescriptor::new("id", "int4")]).primary_key("id"),
        )
        .table(
            "profile",
            MemoryTable::new(vec![
                ColumnDescriptor::new("id", "int4"),
                ColumnDescriptor::new("customer_id", "int4").references("customer", "id"),
            ])
            .primary_key("id")
            .unique("profile_customer_key", &["customer_id"]),
        );

    let file = generate(introspector).await;
    let field = &model(&file, "Profile").fields[0];
    assert_eq!(field.relation_kind(), Some(RelationKind::OneToOne));
    assert!(!field.params.contains_key("unique"));
}

#[tokio::test]
async fn test_self_reference_uses_sentinel() {
    let introspector = MemoryIntrospector::new(BackendKind::PostgreSQL).table(
        "category",
        MemoryTable::new(vec![
            ColumnDescriptor::new("id", "int4"),
            ColumnDescriptor::new("parent_id", "int4")
                .references("category", "id")
                .nullable(),
        ])
        .primary_key("id"),
    );

    let file = generate(introspector).await;
    let parent = &model(&file, "Category").fields[0];
    assert_eq!(
        parent.render(),
        "parent = models.ForeignKey('self', models.DO_NOTHING, blank=True, null=True)"
    );
}

#[tokio::test]
async fn test_forward_reference_to_later_model() {
    let introspector = MemoryIntrospector::new(BackendKind::PostgreSQL)
        .table(
            "article",
            MemoryTable::new(vec![
                ColumnDescriptor::new("id", "int4"),
                ColumnDescriptor::new("writer_id", "int4").references("writer", "id"),
            ])
            .primary_key("id"),
        )
        .table(
            "writer",
            MemoryTable::new(vec![ColumnDescriptor::new("id", "int4")]).primary_key("id"),
        );

    let file = generate(introspector).await;
    assert_eq!(
        model(&file, "Article").fields[0].render(),
        "writer = models.ForeignKey('Writer', models.DO_NOTHING)"
    );
}

#[tokio::test]
async fn test_unsupported_relations_keep_scalar_fields() {
    let file = generate(shop(BackendKind::PostgreSQL).without_relations()).await;

    let order = model(&file, "CustomerOrder");
    assert!(order.fields.iter().all(|field| field.relation_kind().is_none()));
    let names: Vec<&str> = order.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["customer_id", "total"]);
}

#[tokio::test]
async fn test_unsupported_constraints_degrade() {
    let file = generate(shop(BackendKind::PostgreSQL).without_constraints()).await;

    // The auto-increment column still stands in as the implicit id
    let customer = model(&file, "Customer");
    let names: Vec<&str> = customer.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name"]);

    let order = model(&file, "CustomerOrder");
    assert_eq!(
        order.fields[0].render(),
        "customer = models.ForeignKey(Customer, models.DO_NOTHING)"
    );
}

#[tokio::test]
async fn test_broken_table_becomes_comment() {
    let introspector = shop(BackendKind::PostgreSQL).table("audit_log", MemoryTable::broken());
    let file = generate(introspector).await;

    assert_eq!(file.entries.len(), 3);
    assert!(matches!(
        &file.entries[0],
        ModelEntry::Skipped { table, reason } if table == "audit_log" && reason.contains("permission denied")
    ));
    assert_eq!(file.model_names(), vec!["Customer", "CustomerOrder"]);
}

#[tokio::test]
async fn test_views_are_excluded_by_default() {
    let mut view = MemoryTable::new(vec![ColumnDescriptor::new("total", "numeric")]);
    view.is_view = true;
    let file = generate(shop(BackendKind::PostgreSQL).table("order_totals", view)).await;

    assert_eq!(file.model_names(), vec!["Customer", "CustomerOrder"]);
}

#[tokio::test]
async fn test_relation_to_excluded_view_stays_scalar() {
    let mut view = MemoryTable::new(vec![ColumnDescriptor::new("id", "int4")]);
    view.is_view = true;
    let introspector = MemoryIntrospector::new(BackendKind::PostgreSQL)
        .table("region_summary", view)
        .table(
            "store",
            MemoryTable::new(vec![
                ColumnDescriptor::new("id", "int4"),
                ColumnDescriptor::new("region_id", "int4").references("region_summary", "id"),
            ])
            .primary_key("id"),
        );

    let file = generate(introspector).await;
    assert_eq!(file.model_names(), vec!["Store"]);

    let region = &model(&file, "Store").fields[0];
    assert_eq!(region.name, "region_id");
    assert!(region.relation_kind().is_none());
    assert!(!region.render().contains("'RegionSummary'"));
}

#[tokio::test]
async fn test_same_table_in_two_aliases_gets_distinct_models() {
    let users = || {
        MemoryIntrospector::new(BackendKind::PostgreSQL)
            .table(
                "users",
                MemoryTable::new(vec![
                    ColumnDescriptor::new("id", "int4").auto_increment(),
                    ColumnDescriptor::new("email", "varchar").with_max_length(254),
                ])
                .primary_key("id"),
            )
            .table(
                "session",
                MemoryTable::new(vec![
                    ColumnDescriptor::new("id", "int4").auto_increment(),
                    ColumnDescriptor::new("user_id", "int4").references("users", "id"),
                ])
                .primary_key("id"),
            )
    };
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new()
        .database("memory://default", users())
        .database("memory://legacy", users());
    let orchestrator = orchestrator(
        project.path(),
        connector,
        &[("default", "memory://default"), ("legacy", "memory://legacy")],
    );

    let report = orchestrator
        .run(BuildOptions {
            skip_migrate: true,
            skip_superuser: true,
            ..BuildOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.aliases[0].models, vec!["Session", "Users"]);
    assert_eq!(report.aliases[1].models, vec!["LegacySession", "LegacyUsers"]);

    let legacy = read(&project.path().join("core/models/legacy.py"));
    assert!(legacy.contains("class LegacyUsers(models.Model):"));
    assert!(legacy.contains("    user = models.ForeignKey('LegacyUsers', models.DO_NOTHING)"));
    assert!(legacy.contains("        db_table = 'users'"));
    assert!(legacy.contains("    _database_alias = 'legacy'"));
    assert!(!legacy.contains("class Users("));

    let admin = read(&project.path().join("core/admin/legacy.py"));
    assert!(admin.contains("    LegacyUsers,"));
    assert!(!admin.contains("    Users,"));
}

#[tokio::test]
async fn test_build_writes_all_files() {
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new()
        .database("memory://shop", shop(BackendKind::PostgreSQL))
        .database(
            "memory://legacy",
            MemoryIntrospector::new(BackendKind::MySQL).table(
                "invoice",
                MemoryTable::new(vec![
                    ColumnDescriptor::new("id", "int").auto_increment(),
                    ColumnDescriptor::new("paid", "tinyint").with_column_type("tinyint(1)"),
                ])
                .primary_key("id"),
            ),
        );
    let migrator = RecordingMigrator::default();
    let bootstrap = RecordingBootstrap::default();

    let orchestrator = Orchestrator::new(
        project.path(),
        config_with(&[("default", "memory://shop"), ("legacy", "memory://legacy")]),
    )
    .unwrap()
    .with_connector(connector)
    .with_migrator(migrator.clone())
    .with_bootstrap(bootstrap.clone());

    let report = orchestrator.run(BuildOptions::default()).await.unwrap();

    assert_eq!(report.model_count(), 3);
    assert!(report.migrated);
    assert_eq!(*migrator.calls.lock().unwrap(), 1);

    let (credentials, outcome) = report.superuser.as_ref().unwrap();
    assert_eq!(credentials.username, "admin");
    assert_eq!(*outcome, ezadmin::collaborators::BootstrapOutcome::Created);

    let models_dir = project.path().join("core/models");
    let admin_dir = project.path().join("core/admin");

    let legacy = read(&models_dir.join("legacy.py"));
    assert!(legacy.contains("class Invoice(models.Model):"));
    assert!(legacy.contains("    paid = models.BooleanField()"));
    assert!(legacy.contains("    _database_alias = 'legacy'"));

    let admin = read(&admin_dir.join("default.py"));
    assert!(admin.contains("from core.models.default import ("));
    assert!(admin.contains("    CustomerOrder,"));

    let models_init = read(&models_dir.join("__init__.py"));
    assert!(models_init.contains("from .default import *"));
    assert!(models_init.contains("from .legacy import *"));

    let admin_init = read(&admin_dir.join("__init__.py"));
    assert!(admin_init.contains("from . import default"));
    assert!(admin_init.contains("from . import legacy"));

    assert!(models_dir.join("routers.py").exists());
    assert_eq!(report.router_path, "core.models.routers.GeneratedModelRouter");
}

#[tokio::test]
async fn test_rebuild_is_byte_identical() {
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new().database("memory://shop", shop(BackendKind::PostgreSQL));
    let bootstrap = RecordingBootstrap::default();
    let orchestrator = orchestrator(project.path(), connector, &[("default", "memory://shop")])
        .with_bootstrap(bootstrap.clone());

    let first = orchestrator.run(BuildOptions::default()).await.unwrap();
    let snapshot: Vec<String> = first.files.iter().map(|file| read(&file.path)).collect();

    let second = orchestrator.run(BuildOptions::default()).await.unwrap();
    let again: Vec<String> = second.files.iter().map(|file| read(&file.path)).collect();

    assert_eq!(snapshot, again);

    let models_init = read(&project.path().join("core/models/__init__.py"));
    assert_eq!(models_init.matches("from .default import *").count(), 1);

    let (_, outcome) = second.superuser.as_ref().unwrap();
    assert_eq!(*outcome, ezadmin::collaborators::BootstrapOutcome::AlreadyExists);
}

#[tokio::test]
async fn test_unsupported_alias_is_skipped() {
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new().database("memory://shop", shop(BackendKind::PostgreSQL));
    let orchestrator = orchestrator(
        project.path(),
        connector,
        &[("default", "memory://shop"), ("mongo", "mongodb://localhost/x")],
    );

    let report = orchestrator
        .run(BuildOptions {
            skip_migrate: true,
            skip_superuser: true,
            ..BuildOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.unsupported.len(), 1);
    assert_eq!(report.unsupported[0].0, "mongo");
    assert!(!report.migrated);
    assert!(report.superuser.is_none());
    assert!(!project.path().join("core/models/mongo.py").exists());

    let models_init = read(&project.path().join("core/models/__init__.py"));
    assert!(!models_init.contains("mongo"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new().database("memory://shop", shop(BackendKind::PostgreSQL));
    let migrator = RecordingMigrator::default();
    let orchestrator = orchestrator(project.path(), connector, &[("default", "memory://shop")])
        .with_migrator(migrator.clone());

    let report = orchestrator
        .run(BuildOptions {
            dry_run: true,
            ..BuildOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.files.len(), 5);
    assert!(report.files.iter().all(|file| !file.path.exists()));
    assert_eq!(*migrator.calls.lock().unwrap(), 0);
    assert!(report.superuser.is_none());
}

#[tokio::test]
async fn test_migration_failure_aborts() {
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new().database("memory://shop", shop(BackendKind::PostgreSQL));
    let bootstrap = RecordingBootstrap::default();
    let orchestrator = orchestrator(project.path(), connector, &[("default", "memory://shop")])
        .with_migrator(RecordingMigrator {
            fail: true,
            ..RecordingMigrator::default()
        })
        .with_bootstrap(bootstrap.clone());

    let err = orchestrator.run(BuildOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Migration(_)));
    assert!(bootstrap.accounts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backup_before_overwrite() {
    let project = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new().database("memory://shop", shop(BackendKind::PostgreSQL));
    let orchestrator = orchestrator(project.path(), connector, &[("default", "memory://shop")]);
    let options = BuildOptions {
        skip_migrate: true,
        skip_superuser: true,
        ..BuildOptions::default()
    };

    let first = orchestrator.run(options).await.unwrap();
    assert!(first.backups.is_empty());

    let second = orchestrator
        .run(BuildOptions {
            backup: true,
            ..options
        })
        .await
        .unwrap();

    assert_eq!(second.backups.len(), 2);
    let models_backup = &second.backups[0];
    assert_eq!(models_backup.kind, "models");
    assert!(models_backup.path.join("default.py").exists());
}
