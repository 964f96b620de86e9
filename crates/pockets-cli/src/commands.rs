use pockets_api_types::{
    CacheRefreshRequest, CacheRefreshResponse, CacheStatusResponse, CreateLinkRequest,
    CreateLinkResponse, LinksResponse, MetadataResponse, RevalidateRequest, RevalidateResponse,
};

use crate::args::{CacheCommand, Command, CreateArgs, LinksCommand, ListArgs, RevalidateArgs};
use crate::client::{CliError, Ctx};

/// Run `command` and return the JSON to print.
pub async fn run(ctx: &Ctx, command: Command) -> Result<serde_json::Value, CliError> {
    match command {
        Command::Cache(CacheCommand::Status) => to_json(cache_status(ctx).await?),
        Command::Cache(CacheCommand::Refresh(args)) => to_json(
            cache_refresh(
                ctx,
                CacheRefreshRequest {
                    page: args.page,
                    per_page: args.per_page,
                },
            )
            .await?,
        ),
        Command::Revalidate(args) => to_json(revalidate(ctx, args).await?),
        Command::Links(LinksCommand::List(args)) => to_json(list_links(ctx, args).await?),
        Command::Links(LinksCommand::Create(args)) => to_json(create_link(ctx, args).await?),
        Command::Metadata(args) => to_json(
            ctx.get::<MetadataResponse>("api/metadata", &[("url", args.url)])
                .await?,
        ),
    }
}

pub async fn cache_status(ctx: &Ctx) -> Result<CacheStatusResponse, CliError> {
    ctx.get("api/cache/status", &[]).await
}

pub async fn cache_refresh(
    ctx: &Ctx,
    request: CacheRefreshRequest,
) -> Result<CacheRefreshResponse, CliError> {
    ctx.post("api/cache/refresh", &request).await
}

pub async fn revalidate(ctx: &Ctx, args: RevalidateArgs) -> Result<RevalidateResponse, CliError> {
    let request = RevalidateRequest {
        path: Some(args.path),
        kind: Some(args.scope.as_str().to_string()),
        tag: args.tag,
    };
    ctx.post("api/revalidate", &request).await
}

pub async fn list_links(ctx: &Ctx, args: ListArgs) -> Result<LinksResponse, CliError> {
    let mut query = Vec::new();
    if let Some(page) = args.page {
        query.push(("page", page.to_string()));
    }
    if let Some(per_page) = args.per_page {
        query.push(("per_page", per_page.to_string()));
    }
    if let Some(search) = args.search {
        query.push(("search", search));
    }
    ctx.get("api/links", &query).await
}

pub async fn create_link(ctx: &Ctx, args: CreateArgs) -> Result<CreateLinkResponse, CliError> {
    let request = CreateLinkRequest {
        pin: args.pin,
        name: args.name,
        slug: args.slug,
        value: args.value,
        kind: args.kind,
    };
    ctx.post("api/admin/links", &request).await
}

fn to_json<T: serde::Serialize>(value: T) -> Result<serde_json::Value, CliError> {
    Ok(serde_json::to_value(value)?)
}
