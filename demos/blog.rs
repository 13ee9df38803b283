//! Blog example: posts with their author and comments, resolved concurrently

use scopegraph::prelude::*;
use tracing_subscriber::EnvFilter;

fn ids(records: &[RecordRef], attribute: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.str_attribute(attribute))
        .collect()
}

fn seed(store: &InMemoryAdapter) -> Result<()> {
    let now = Utc::now();
    store.insert_all([
        Record::shared("user", "u1", json!({"name": "Ada"}), now),
        Record::shared("user", "u2", json!({"name": "Grace"}), now),
        Record::shared(
            "post",
            "p1",
            json!({"title": "Hello", "status": "published", "author_id": "u1"}),
            now,
        ),
        Record::shared(
            "post",
            "p2",
            json!({"title": "Draft", "status": "draft", "author_id": "u2"}),
            now,
        ),
        Record::shared(
            "post",
            "p3",
            json!({"title": "Scopes", "status": "published", "author_id": "u2"}),
            now,
        ),
        Record::shared("comment", "c1", json!({"post_id": "p1", "author_id": "u2", "body": "Nice"}), now),
        Record::shared("comment", "c2", json!({"post_id": "p3", "author_id": "u1", "body": "+1"}), now),
    ])
}

fn author() -> SideloadBuilder {
    SideloadBuilder::new("author", "user")
        .scope(|records| ScopeObject::new("user").lookup(ids(records, "author_id")))
        .assign(|records, users| {
            for record in records {
                let user = users
                    .iter()
                    .find(|u| record.str_attribute("author_id").as_deref() == Some(u.id()))
                    .cloned();
                record.attach("author", Related::One(user));
            }
        })
}

fn comments() -> SideloadBuilder {
    SideloadBuilder::new("comments", "comment")
        .scope(|posts| {
            ScopeObject::new("comment").where_in("post_id", posts.iter().map(|p| p.id()))
        })
        .assign(|posts, comments| {
            for post in posts {
                let mine = comments
                    .iter()
                    .filter(|c| c.str_attribute("post_id").as_deref() == Some(post.id()))
                    .cloned()
                    .collect();
                post.attach("comments", Related::Many(mine));
            }
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = Arc::new(InMemoryAdapter::new());
    seed(&store)?;

    let post = Resource::builder("post")
        .adapter(store.clone())
        .default_filter("status", "published")
        .default_sort(SortParam::asc("title"))
        .sideload(author())
        .sideload(comments())
        .build()?;
    let comment = Resource::builder("comment")
        .adapter(store.clone())
        .sideload(author())
        .build()?;
    let user = Resource::builder("user").adapter(store.clone()).build()?;

    let bus = EventBus::default();
    let mut events = bus.subscribe();

    let runtime = Runtime::builder()
        .with_config(ResolverConfig::default().with_concurrency(true).with_cache(true))
        .register(post)
        .register(comment)
        .register(user)
        .with_event_bus(bus)
        .before_sideload(|context| {
            tracing::debug!(tenant = ?context.tenant_id(), "Sideload task started");
        })
        .build()?;

    println!("Include tree: {}", serde_json::to_string(&runtime.registry().include_tree("post"))?);

    let query = Query::new().include("author")?.include("comments.author")?;
    let context = RequestContext::new().with("tenant_id", 1);
    let resolved = runtime.all("post", query, context).await?;

    for record in &resolved.records {
        println!("{}", serde_json::to_string_pretty(&record.to_json())?);
    }
    println!("Cache key: {}", resolved.cache_key.unwrap_or_default());

    while let Ok(envelope) = events.try_recv() {
        println!(
            "resolve {} (sideload: {:?}) -> {} records",
            envelope.event.resource, envelope.event.sideload, envelope.event.result_count
        );
    }

    Ok(())
}
