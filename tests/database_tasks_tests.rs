use serde_json::json;
use sqlite_replica_proxy::{DatabaseTasks, ProxiedDatabase};
use tempfile::TempDir;

const SCHEMA: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
CREATE INDEX users_name ON users (name);
CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users (id), body TEXT);
CREATE VIEW user_posts AS SELECT users.name, posts.body FROM users JOIN posts ON posts.user_id = users.id;
";

fn tasks_in(temp: &TempDir, name: &str) -> DatabaseTasks {
   DatabaseTasks::new(temp.path().join(name))
}

fn write_schema(temp: &TempDir) -> std::path::PathBuf {
   let path = temp.path().join("schema.sql");
   std::fs::write(&path, SCHEMA).unwrap();
   path
}

async fn object_names(tasks: &DatabaseTasks) -> Vec<String> {
   let db = ProxiedDatabase::connect_with_path(tasks.path(), None, None)
      .await
      .unwrap();
   let rows = db
      .fetch_all(
         "SELECT name FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY name",
         vec![],
      )
      .await
      .unwrap();
   db.close().await.unwrap();

   rows
      .iter()
      .map(|row| row["name"].as_str().unwrap().to_string())
      .collect()
}

#[tokio::test]
async fn test_create_and_drop() {
   let temp = TempDir::new().unwrap();
   let tasks = tasks_in(&temp, "tasks.db");

   tasks.create().await.unwrap();
   assert!(tasks.path().exists());

   // Creating an existing database is harmless
   tasks.create().await.unwrap();

   tasks.drop().await.unwrap();
   assert!(!tasks.path().exists());
   assert!(!tasks.path().with_extension("db-wal").exists());

   // Nothing left to drop
   tasks.drop().await.unwrap();
}

#[tokio::test]
async fn test_structure_load() {
   let temp = TempDir::new().unwrap();
   let tasks = tasks_in(&temp, "load.db");
   let schema = write_schema(&temp);

   tasks.create().await.unwrap();
   assert!(object_names(&tasks).await.is_empty());

   tasks.structure_load(&schema).await.unwrap();

   assert_eq!(
      object_names(&tasks).await,
      vec!["posts", "user_posts", "users", "users_name"]
   );
}

#[tokio::test]
async fn test_structure_dump_round_trips_schema() {
   let temp = TempDir::new().unwrap();
   let tasks = tasks_in(&temp, "dump.db");
   let schema = write_schema(&temp);
   let dump_path = temp.path().join("dump.sql");

   tasks.create().await.unwrap();
   tasks.structure_load(&schema).await.unwrap();
   tasks.structure_dump(&dump_path).await.unwrap();

   assert_eq!(std::fs::read_to_string(&dump_path).unwrap(), SCHEMA);

   // The dump recreates the same schema elsewhere
   let copy = tasks_in(&temp, "copy.db");
   copy.structure_load(&dump_path).await.unwrap();
   assert_eq!(object_names(&copy).await, object_names(&tasks).await);
}

#[tokio::test]
async fn test_purge_removes_schema_and_keeps_file() {
   let temp = TempDir::new().unwrap();
   let tasks = tasks_in(&temp, "purge.db");
   let schema = write_schema(&temp);

   tasks.structure_load(&schema).await.unwrap();

   let db = ProxiedDatabase::connect_with_path(tasks.path(), None, None)
      .await
      .unwrap();
   db.execute("INSERT INTO users (name) VALUES ($1)", vec![json!("Alice")])
      .await
      .unwrap();
   db.execute(
      "INSERT INTO posts (user_id, body) VALUES ($1, $2)",
      vec![json!(1), json!("hello")],
   )
   .await
   .unwrap();
   db.close().await.unwrap();

   tasks.purge().await.unwrap();

   assert!(tasks.path().exists());
   assert!(object_names(&tasks).await.is_empty());
}

#[tokio::test]
async fn test_tasks_from_database_reuse_its_path() {
   let temp = TempDir::new().unwrap();
   let db = ProxiedDatabase::connect_with_path(&temp.path().join("owned.db"), None, None)
      .await
      .unwrap();

   let tasks = db.tasks();
   assert_eq!(tasks.path(), db.inner().path());

   db.close().await.unwrap();
   tasks.drop().await.unwrap();
   assert!(!tasks.path().exists());
}

#[tokio::test]
async fn test_structure_load_missing_file() {
   let temp = TempDir::new().unwrap();
   let tasks = tasks_in(&temp, "missing.db");

   let err = tasks
      .structure_load(temp.path().join("nope.sql"))
      .await
      .unwrap_err();
   assert_eq!(err.error_code(), "IO_ERROR");
   assert!(!tasks.path().exists());
}
