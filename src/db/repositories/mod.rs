mod entries;
mod snapshots;
