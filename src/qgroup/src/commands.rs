//! One function per subcommand: validate, open the path, issue the request.
//!
//! Everything that can be checked without the filesystem is checked before the path is opened.

use std::path::Path;

use tracing::debug;

use crate::{
    config::Config,
    coordinator::{self, RescanFlags, Settlement},
    engine::{ListingEngine, QuotaEngine},
    error::{Error, Result},
    id,
    listing::{ListingSpec, ListingSpecBuilder, QgroupRow},
    request::{AssignRequest, CreateRequest, LimitKind, LimitRequest, LimitTarget, Relation},
};

pub fn relation<E: QuotaEngine>(
    engine: &E,
    config: &Config,
    relation: Relation,
    src: &str,
    dst: &str,
    path: &Path,
    flags: RescanFlags,
) -> Result<Settlement> {
    let req = AssignRequest::build(relation, src, dst, path)?;
    let pref = flags.resolve(config.no_rescan);

    let handle = engine.open_dir(path)?;
    let op = match relation {
        Relation::Assign => "assign quota group",
        Relation::Remove => "remove quota group relation",
    };
    let status = engine.assign(&handle, &req).map_err(Error::engine(op))?;
    debug!(?status, "relation {} done", relation.verb());

    Ok(coordinator::settle(engine, &handle, status, pref))
}

pub fn create<E: QuotaEngine>(engine: &E, create: bool, qgroupid: &str, path: &Path) -> Result<CreateRequest> {
    let req = CreateRequest::build(create, qgroupid)?;

    let handle = engine.open_dir(path)?;
    let op = if create { "create quota group" } else { "destroy quota group" };
    engine.create(&handle, &req).map_err(Error::engine(op))?;
    Ok(req)
}

#[derive(Clone, Copy, Debug)]
pub struct LimitArgs<'a> {
    pub size: &'a str,
    pub qgroupid: Option<&'a str>,
    pub path: &'a Path,
    pub kind: LimitKind,
    pub compressed: bool,
}

pub fn limit<E: QuotaEngine>(engine: &E, args: LimitArgs<'_>) -> Result<LimitRequest> {
    let size = LimitRequest::parse_size(args.size, args.compressed)?;
    let target = match args.qgroupid {
        Some(qgroupid) => LimitTarget::Qgroup(id::parse(qgroupid)?),
        None => {
            if !engine.is_subvolume(args.path)? {
                return Err(Error::NotASubvolume(args.path.to_path_buf()));
            }
            LimitTarget::CurrentSubvolume
        }
    };
    let req = LimitRequest::new(target, size, args.kind);

    let handle = engine.open_dir(args.path)?;
    engine
        .limit(&handle, &req)
        .map_err(Error::engine("limit requested quota group"))?;
    Ok(req)
}

pub fn show<E: ListingEngine>(
    engine: &E,
    builder: &ListingSpecBuilder,
    path: &Path,
) -> Result<(ListingSpec, Vec<QgroupRow>)> {
    let handle = engine.open_dir(path)?;
    let spec = builder.build(|| engine.root_id(&handle))?;
    debug!(?spec, "listing");

    let rows = engine
        .list(&handle, &spec)
        .map_err(Error::engine("list quota groups"))?;
    Ok((spec, rows))
}
