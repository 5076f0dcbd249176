//! Basic usage of the AVL tree.

use avl_rs::AvlTree;

fn main() {
    let mut tree: AvlTree<i32, i32> = AvlTree::new();
    tree.print_bfs();

    *tree.get_or_insert_default(3) = 6;
    *tree.get_or_insert_default(2) = 3;
    *tree.get_or_insert_default(4) = 1;
    *tree.get_or_insert_default(5) = 1;
    *tree.get_or_insert_default(8) = 7;

    tree.print_bfs();
    println!("height: {}", tree.height());
    println!("contains 5: {}", tree.contains_key(&5));
    println!("contains 9: {}", tree.contains_key(&9));

    // A repeated insert keeps the first value.
    tree.insert(5, 100);
    println!("value at 5: {:?}", tree.get(&5));
    println!("{tree:?}");
}
